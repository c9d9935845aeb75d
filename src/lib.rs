pub mod aggregator;
pub mod chat;
pub mod cli;
pub mod error;
pub mod llm_client;
pub mod llm_types;
pub mod metrics;
pub mod model_catalog;
mod ndjson;
pub mod render;
pub mod server_info;
pub mod settings;
#[cfg(test)]
mod testing;
pub mod transcript;

use anyhow::{Context, Result};
use chat::{run_repl, ChatSession};
use clap::Parser;
use cli::CliArgs;
use env_filter::Builder as EnvFilterBuilder;
use llm_client::OllamaClient;
use log::{info, warn, LevelFilter};
use model_catalog::{is_error_entry, ModelCatalog};
use settings::{
    default_settings_path, get_effective_host, load_or_create_settings, normalize_host,
    ChatSettings,
};
use std::io::{self, Write};
use std::time::Duration;

/// Pick the console filter. An invalid `RUST_LOG` is returned alongside so
/// it can be reported once the logger is up.
fn build_console_logger(debug: bool) -> (env_logger::Builder, Option<String>) {
    let mut builder = env_logger::Builder::new();
    let mut rejected = None;

    if debug {
        builder.filter_level(LevelFilter::Debug);
        return (builder, rejected);
    }

    match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.trim().is_empty() => {
            if let Err(err) = EnvFilterBuilder::new().try_parse(&spec) {
                rejected = Some(format!(
                    "Ignoring invalid RUST_LOG value '{}': {}. Falling back to warn-level console logging",
                    spec, err
                ));
                builder.filter_level(LevelFilter::Warn);
            } else {
                builder.parse_filters(&spec);
            }
        }
        _ => {
            builder.filter_level(LevelFilter::Warn);
        }
    }

    (builder, rejected)
}

fn init_logging(debug: bool) {
    let (mut builder, rejected) = build_console_logger(debug);
    builder.format_timestamp_millis();
    if builder.try_init().is_err() {
        return;
    }
    if let Some(message) = rejected {
        warn!("{}", message);
    }
}

pub fn run() {
    let args = CliArgs::parse();
    init_logging(args.debug);

    if let Err(e) = try_run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn try_run(args: CliArgs) -> Result<()> {
    let settings_path = args.config.clone().or_else(default_settings_path);
    let settings = match &settings_path {
        Some(path) => load_or_create_settings(path)?,
        None => {
            warn!("No config directory found, using default settings");
            ChatSettings::default()
        }
    };

    let host = match &args.host {
        Some(host) => normalize_host(host),
        None => get_effective_host(&settings),
    };
    info!("Using Ollama server at {}", host);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let catalog = ModelCatalog::new();

    if args.list_models {
        let models = runtime.block_on(catalog.list_models());
        if let Some(failure) = models.iter().find(|m| is_error_entry(m)) {
            anyhow::bail!("{}", failure);
        }
        let mut out = io::stdout().lock();
        for model in models {
            writeln!(out, "{}", model)?;
        }
        return Ok(());
    }

    let client = OllamaClient::new(&host, Duration::from_secs(settings.connect_timeout_secs))
        .context("Failed to create HTTP client")?;
    let mut session = ChatSession::new(client, catalog, settings, settings_path, args.model);

    run_repl(&runtime, &mut session, io::stdin().lock(), io::stdout())
}
