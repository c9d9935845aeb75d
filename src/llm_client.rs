use crate::error::TransportError;
use crate::llm_types::VersionResponse;
use crate::ndjson;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::time::Duration;

pub const CHAT_ENDPOINT: &str = "/api/chat";
pub const VERSION_ENDPOINT: &str = "/api/version";

/// Reported when `/api/version` answers without a `version` field.
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Lines of a streamed response body, in arrival order.
pub type LineStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

enum ResponseBody {
    Lines(LineStream),
    Text(String),
}

/// Status line plus the body: a lazy line stream for accepted requests, the
/// full text for rejected ones.
pub struct StreamingResponse {
    pub status: u16,
    body: ResponseBody,
}

impl StreamingResponse {
    pub fn new(status: u16, lines: LineStream) -> Self {
        Self {
            status,
            body: ResponseBody::Lines(lines),
        }
    }

    /// A response whose body was read in full, exactly as the server sent it.
    pub fn rejected(status: u16, body: String) -> Self {
        Self {
            status,
            body: ResponseBody::Text(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_lines(self) -> LineStream {
        match self.body {
            ResponseBody::Lines(lines) => lines,
            ResponseBody::Text(text) => {
                let lines: Vec<_> = text
                    .split('\n')
                    .map(|line| Ok::<_, TransportError>(line.as_bytes().to_vec()))
                    .collect();
                stream::iter(lines).boxed()
            }
        }
    }

    /// The body as text. Only meant for error reporting.
    pub async fn into_body_text(self) -> String {
        let mut lines = match self.body {
            ResponseBody::Text(text) => return text,
            ResponseBody::Lines(lines) => lines,
        };

        let mut body = Vec::new();
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if !body.is_empty() {
                        body.push(b'\n');
                    }
                    body.extend_from_slice(&line);
                }
                Err(e) => {
                    debug!("Stopped reading error body: {}", e);
                    break;
                }
            }
        }
        String::from_utf8_lossy(&body).into_owned()
    }
}

/// Channel to the inference server.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// POST `body` to `endpoint` and hand back the status and the body lines
    /// without reading them.
    async fn post_streaming(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<StreamingResponse, TransportError>;

    async fn get_version(&self, endpoint: &str) -> Result<String, TransportError>;
}

fn build_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/x-ndjson"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("ollama-chat/", env!("CARGO_PKG_VERSION"))),
    );

    headers
}

/// reqwest-backed transport talking to an Ollama server.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Only the connect phase is bounded; a slow generation is never cut off.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .default_headers(build_headers())
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl InferenceTransport for OllamaClient {
    async fn post_streaming(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<StreamingResponse, TransportError> {
        let url = self.url(endpoint);
        debug!("Sending streaming request to: {}", url);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status().as_u16();
        debug!("Response status from {}: {}", url, status);

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Ok(StreamingResponse::rejected(status, error_text));
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));
        let lines = ndjson::lines(Box::pin(chunks)).boxed();

        Ok(StreamingResponse::new(status, lines))
    }

    async fn get_version(&self, endpoint: &str) -> Result<String, TransportError> {
        let url = self.url(endpoint);
        debug!("Fetching server version from: {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(TransportError::InvalidResponse(format!(
                "Version request failed with status {}: {}",
                status, error_text
            )));
        }

        let parsed: VersionResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("Failed to parse version: {}", e)))?;

        Ok(parsed
            .version
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string()))
    }
}
