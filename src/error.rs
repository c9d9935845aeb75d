use thiserror::Error;

/// Failures of the channel to the inference server itself.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Why a single chat exchange did not produce a committed reply.
///
/// Every variant is terminal for the exchange. Nothing is retried and no
/// metrics are recorded.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection Error: {0}")]
    Transport(#[from] TransportError),

    #[error("API Error: {status} - {body}")]
    ApiError { status: u16, body: String },

    #[error("malformed response fragment ({reason}): {line}")]
    MalformedFragment { line: String, reason: String },

    #[error(
        "stream closed before the final fragment ({} characters received)",
        partial.chars().count()
    )]
    IncompleteStream { partial: String },
}

impl ExchangeError {
    /// Text that was streamed before the failure, if the error kept it.
    pub fn partial_text(&self) -> Option<&str> {
        match self {
            ExchangeError::IncompleteStream { partial } if !partial.is_empty() => {
                Some(partial.as_str())
            }
            _ => None,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, ExchangeError::Transport(_))
    }
}
