use crate::aggregator::StreamAggregator;
use crate::error::ExchangeError;
use crate::llm_client::InferenceTransport;
use crate::llm_types::Role;
use crate::metrics::ResponseMetrics;
use crate::model_catalog::{is_error_entry, ModelCatalog};
use crate::render::StreamRenderer;
use crate::server_info::{fetch_version, ServerStatus, TtlCache};
use crate::settings::{write_settings, ChatSettings};
use crate::transcript::Transcript;
use anyhow::Result;
use log::{debug, info, warn};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;

const SERVE_HINT: &str = "📢 Check if Ollama server is running with `ollama serve`";

const HELP_TEXT: &str = "\
Commands:
  /models          list installed models
  /model <name>    switch to another model
  /status          refresh and show server information
  /metrics         technical details for every reply
  /history         show the conversation so far
  /clear           start a new conversation
  /quit            leave
Anything else is sent to the model.";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Models,
    UseModel(String),
    Status,
    Metrics,
    History,
    Clear,
    Quit,
    Unknown(String),
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub fn parse_input(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return Command::Message(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "help" | "?" => Command::Help,
        "models" => Command::Models,
        "model" => Command::UseModel(rest.to_string()),
        "status" | "refresh" => Command::Status,
        "metrics" => Command::Metrics,
        "history" => Command::History,
        "clear" => Command::Clear,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Everything a chat session keeps between exchanges.
pub struct ChatSession<T: InferenceTransport> {
    transport: T,
    catalog: ModelCatalog,
    transcript: Transcript,
    model: Option<String>,
    settings: ChatSettings,
    settings_path: Option<PathBuf>,
    version_cache: TtlCache<String>,
    models_cache: TtlCache<Vec<String>>,
}

impl<T: InferenceTransport> ChatSession<T> {
    pub fn new(
        transport: T,
        catalog: ModelCatalog,
        settings: ChatSettings,
        settings_path: Option<PathBuf>,
        model: Option<String>,
    ) -> Self {
        let ttl = Duration::from_secs(settings.cache_ttl_secs);
        let model = [model, Some(settings.selected_model.clone())]
            .into_iter()
            .flatten()
            .map(|m| m.trim().to_string())
            .find(|m| !m.is_empty());

        Self {
            transport,
            catalog,
            transcript: Transcript::new(),
            model,
            settings,
            settings_path,
            version_cache: TtlCache::new(ttl),
            models_cache: TtlCache::new(ttl),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub async fn server_version(&mut self) -> String {
        let transport = &self.transport;
        self.version_cache
            .get_or_refresh(|| fetch_version(transport))
            .await
    }

    pub async fn available_models(&mut self) -> Vec<String> {
        let catalog = &self.catalog;
        self.models_cache
            .get_or_refresh(|| catalog.list_models())
            .await
    }

    /// Fall back to the first installed model when none was chosen.
    pub async fn ensure_model(&mut self) -> Option<String> {
        if self.model.is_none() {
            let models = self.available_models().await;
            self.model = models.into_iter().find(|m| !is_error_entry(m));
            if let Some(model) = &self.model {
                info!("No model configured, using {}", model);
            }
        }
        self.model.clone()
    }

    /// Switch models and remember the choice in the settings file.
    pub fn select_model(&mut self, name: &str) -> Result<()> {
        let name = name.trim().to_string();
        self.settings.selected_model = name.clone();
        self.model = Some(name);
        if let Some(path) = &self.settings_path {
            write_settings(path, &self.settings)?;
        }
        Ok(())
    }

    /// Run one exchange for `prompt`, streaming the reply to `out`.
    ///
    /// The reply and its metrics are committed only when the exchange
    /// completes. The user message stays in the transcript either way.
    pub async fn send<W: Write>(
        &mut self,
        prompt: &str,
        out: &mut W,
    ) -> Result<ResponseMetrics, ExchangeError> {
        let model = self.model.clone().ok_or_else(|| {
            ExchangeError::InvalidRequest(
                "no model selected, use /model <name>".to_string(),
            )
        })?;

        self.transcript.push_user(prompt);

        let mut renderer = StreamRenderer::new(&mut *out);
        let result = {
            let mut aggregator = StreamAggregator::new(&self.transport);
            aggregator
                .run(self.transcript.messages(), &model, |snapshot| {
                    if let Err(e) = renderer.update(snapshot) {
                        debug!("Failed to render reply: {}", e);
                    }
                })
                .await
        };
        if let Err(e) = renderer.finish() {
            debug!("Failed to finish reply: {}", e);
        }

        let outcome = result?;
        let metrics = outcome.metrics.clone();
        self.transcript.commit_exchange(outcome.text, outcome.metrics);
        Ok(metrics)
    }

    pub async fn handle<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Flow> {
        match command {
            Command::Empty => {}
            Command::Help => writeln!(out, "{}", HELP_TEXT)?,
            Command::Models => {
                let models = self.available_models().await;
                if models.is_empty() {
                    writeln!(out, "No models installed. Try `ollama pull <model>`.")?;
                }
                for model in models {
                    let marker = if self.model.as_deref() == Some(model.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    writeln!(out, "{} {}", marker, model)?;
                }
            }
            Command::UseModel(name) => {
                if name.is_empty() {
                    writeln!(out, "Usage: /model <name>")?;
                } else {
                    let models = self.available_models().await;
                    if !models.iter().any(|m| m == &name) {
                        warn!("Model {} is not in the installed list", name);
                        writeln!(out, "⚠️ {} is not in the installed model list", name)?;
                    }
                    self.select_model(&name)?;
                    writeln!(out, "📌 Current Model: {}", name)?;
                }
            }
            Command::Status => {
                self.version_cache.invalidate();
                self.write_status(out).await?;
            }
            Command::Metrics => self.write_metrics(out)?,
            Command::History => {
                for message in self.transcript.messages() {
                    let label = match message.role() {
                        Role::User => "🧑 user",
                        Role::Assistant => "🤖 assistant",
                    };
                    writeln!(out, "{}: {}", label, message.content())?;
                }
            }
            Command::Clear => {
                self.transcript.clear();
                writeln!(out, "Conversation cleared.")?;
            }
            Command::Quit => return Ok(Flow::Quit),
            Command::Unknown(name) => {
                writeln!(out, "Unknown command /{}. Type /help for a list.", name)?;
            }
            Command::Message(prompt) => {
                write!(out, "🤖 ")?;
                out.flush()?;
                match self.send(&prompt, out).await {
                    Ok(metrics) => {
                        if self.settings.show_metrics {
                            writeln!(out, "{}", metrics_summary(&metrics))?;
                        }
                    }
                    Err(e) => {
                        writeln!(out, "🚨 {}", e)?;
                        if e.partial_text().is_some() {
                            writeln!(out, "(partial reply was not saved)")?;
                        }
                        if e.is_connectivity() {
                            writeln!(out, "{}", SERVE_HINT)?;
                        }
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    pub async fn write_status<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let version = self.server_version().await;
        let status = ServerStatus::from_version(&version);

        writeln!(out, "🛠 Ollama Version: {}", version)?;
        writeln!(out, "🖥️ Server Status: {}", status.label())?;
        writeln!(
            out,
            "📌 Current Model: {}",
            self.model.as_deref().unwrap_or("(none)")
        )?;
        writeln!(out, "💬 Total Messages: {}", self.transcript.len())?;
        writeln!(
            out,
            "🕒 Last Updated: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;

        if let Some(metrics) = self.transcript.last_metrics() {
            writeln!(out, "📊 Last Response Metrics")?;
            writeln!(out, "  ⏱️ Response Time: {}", metrics.response_time_display())?;
            writeln!(out, "  🔢 Tokens Generated: {}", metrics.token_count_display())?;
            writeln!(out, "  ⚡ Processing Time: {}", metrics.processing_time_display())?;
        }
        Ok(())
    }

    fn write_metrics<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.transcript.metrics().is_empty() {
            writeln!(out, "No completed replies yet.")?;
            return Ok(());
        }

        let mut reply = 0;
        for (index, message) in self.transcript.messages().iter().enumerate() {
            let Some(metrics) = self.transcript.metrics_for_message(index) else {
                continue;
            };
            reply += 1;
            let preview: String = message.content().chars().take(40).collect();
            writeln!(out, "📊 Technical Details #{} ({})", reply, preview)?;
            writeln!(out, "{}", serde_json::to_string_pretty(metrics)?)?;
        }
        Ok(())
    }
}

pub fn metrics_summary(metrics: &ResponseMetrics) -> String {
    format!(
        "📊 Latest Response Metrics: ⏱️ Response Time: {} | 🔢 Token Count: {} | ⚡ Processing Time: {}",
        metrics.response_time_display(),
        metrics.token_count_display(),
        metrics.processing_time_display()
    )
}

/// Read commands from `input` until EOF or `/quit`, one exchange at a time.
pub fn run_repl<T, R, W>(
    runtime: &Runtime,
    session: &mut ChatSession<T>,
    mut input: R,
    mut out: W,
) -> Result<()>
where
    T: InferenceTransport,
    R: BufRead,
    W: Write,
{
    writeln!(out, "🚀 Ollama Chat")?;
    runtime.block_on(session.ensure_model());
    runtime.block_on(session.write_status(&mut out))?;
    writeln!(out, "Type /help for commands.")?;

    loop {
        write!(out, "\n> ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }

        let command = parse_input(&line);
        if runtime.block_on(session.handle(command, &mut out))? == Flow::Quit {
            break;
        }
    }

    info!(
        "Chat session ended after {} messages",
        session.transcript().len()
    );
    Ok(())
}
