use crate::error::ExchangeError;
use crate::llm_client::{InferenceTransport, CHAT_ENDPOINT};
use crate::llm_types::{ChatMessage, ChatRequest, ResponseFragment, Role};
use crate::metrics::ResponseMetrics;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use std::time::Instant;

/// Suffix shown after the text while a reply is still streaming.
pub const CURSOR_MARKER: &str = "▌";

/// Lifecycle of a single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

impl ExchangeState {
    pub fn can_transition_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        matches!(
            (self, next),
            (Idle, Sending)
                | (Sending, Streaming)
                | (Sending, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Completed | ExchangeState::Failed)
    }
}

/// The committed result of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOutcome {
    pub text: String,
    pub metrics: ResponseMetrics,
}

/// Runs one chat exchange against the inference server and reassembles the
/// streamed reply.
///
/// An aggregator handles a single exchange. Once it reaches `Completed` or
/// `Failed` it refuses to run again; start the next exchange with a fresh
/// instance.
pub struct StreamAggregator<'a, T: InferenceTransport + ?Sized> {
    transport: &'a T,
    state: ExchangeState,
}

impl<'a, T: InferenceTransport + ?Sized> StreamAggregator<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            state: ExchangeState::Idle,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Send `transcript` to `model` and stream the reply.
    ///
    /// `observer` receives the cumulative text followed by [`CURSOR_MARKER`]
    /// for every fragment that carries content, then the clean final text
    /// once the terminal fragment arrives.
    pub async fn run<F>(
        &mut self,
        transcript: &[ChatMessage],
        model: &str,
        mut observer: F,
    ) -> Result<ExchangeOutcome, ExchangeError>
    where
        F: FnMut(&str),
    {
        if self.state != ExchangeState::Idle {
            return Err(ExchangeError::InvalidRequest(format!(
                "exchange already ran (state {:?})",
                self.state
            )));
        }

        let result = self.exchange(transcript, model, &mut observer).await;
        if let Err(e) = &result {
            if self.state != ExchangeState::Idle {
                self.advance(ExchangeState::Failed);
            }
            error!("Chat exchange failed: {}", e);
        }
        result
    }

    async fn exchange<F>(
        &mut self,
        transcript: &[ChatMessage],
        model: &str,
        observer: &mut F,
    ) -> Result<ExchangeOutcome, ExchangeError>
    where
        F: FnMut(&str),
    {
        let model = model.trim();
        validate_request(transcript, model)?;

        let body = serde_json::to_value(ChatRequest {
            model,
            messages: transcript,
            stream: true,
        })
        .map_err(|e| ExchangeError::InvalidRequest(format!("Failed to encode request: {}", e)))?;

        let started = Instant::now();
        self.advance(ExchangeState::Sending);
        debug!(
            "Starting exchange with model {} ({} messages)",
            model,
            transcript.len()
        );

        let response = self.transport.post_streaming(CHAT_ENDPOINT, body).await?;
        if !response.is_success() {
            let status = response.status;
            let body = response.into_body_text().await;
            warn!("Chat request rejected with status {}", status);
            return Err(ExchangeError::ApiError { status, body });
        }

        self.advance(ExchangeState::Streaming);

        let mut lines = response.into_lines();
        let mut accumulated = String::new();
        let mut fragment_count = 0usize;

        while let Some(line) = lines.next().await {
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let fragment = parse_fragment(&line)?;
            fragment_count += 1;

            if let Some(delta) = fragment.delta_text() {
                accumulated.push_str(delta);
                let mut snapshot = String::with_capacity(accumulated.len() + CURSOR_MARKER.len());
                snapshot.push_str(&accumulated);
                snapshot.push_str(CURSOR_MARKER);
                observer(&snapshot);
            }

            if fragment.is_final() {
                let metrics = ResponseMetrics::from_terminal(&fragment, started.elapsed());
                observer(&accumulated);
                self.advance(ExchangeState::Completed);
                info!(
                    "Exchange completed: {} fragments, {} chars in {}",
                    fragment_count,
                    accumulated.chars().count(),
                    metrics.response_time_display()
                );
                return Ok(ExchangeOutcome {
                    text: accumulated,
                    metrics,
                });
            }
        }

        warn!(
            "Stream closed after {} fragments without a final fragment",
            fragment_count
        );
        Err(ExchangeError::IncompleteStream {
            partial: accumulated,
        })
    }

    fn advance(&mut self, next: ExchangeState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid exchange transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Exchange state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn validate_request(transcript: &[ChatMessage], model: &str) -> Result<(), ExchangeError> {
    if model.is_empty() {
        return Err(ExchangeError::InvalidRequest(
            "model name is empty".to_string(),
        ));
    }

    match transcript.last() {
        Some(message) if message.role() == Role::User => Ok(()),
        Some(_) => Err(ExchangeError::InvalidRequest(
            "transcript must end with a user message".to_string(),
        )),
        None => Err(ExchangeError::InvalidRequest(
            "transcript is empty".to_string(),
        )),
    }
}

fn parse_fragment(line: &[u8]) -> Result<ResponseFragment, ExchangeError> {
    let malformed = |reason: String| ExchangeError::MalformedFragment {
        line: String::from_utf8_lossy(line).trim().to_string(),
        reason,
    };

    // Parsed from bytes so invalid UTF-8 is rejected rather than replaced.
    let fragment: ResponseFragment =
        serde_json::from_slice(line).map_err(|e| malformed(e.to_string()))?;

    if let Some(message) = &fragment.error {
        return Err(malformed(format!("server reported an error: {}", message)));
    }

    Ok(fragment)
}
