//! In-memory transport for exercising exchanges without a server.

use crate::error::TransportError;
use crate::llm_client::{InferenceTransport, StreamingResponse};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

enum Reply {
    Stream {
        status: u16,
        lines: Vec<Vec<u8>>,
        // Body error raised once every line has been read.
        failure: Option<String>,
    },
    Unreachable,
}

fn to_bytes(lines: &[&str]) -> Vec<Vec<u8>> {
    lines.iter().map(|line| line.as_bytes().to_vec()).collect()
}

/// Replays scripted replies in order, one per `post_streaming` call.
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    version: Option<String>,
    lines_read: Arc<AtomicUsize>,
    requests: Mutex<Vec<(String, serde_json::Value)>>,
}

impl ScriptedTransport {
    fn from_reply(reply: Reply) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([reply])),
            version: Some("0.5.7".to_string()),
            lines_read: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ok(lines: &[&str]) -> Self {
        Self::with_status(200, lines)
    }

    pub(crate) fn with_status(status: u16, lines: &[&str]) -> Self {
        Self::from_reply(Reply::Stream {
            status,
            lines: to_bytes(lines),
            failure: None,
        })
    }

    /// A 200 reply whose lines are raw bytes, not necessarily UTF-8.
    pub(crate) fn raw(lines: &[&[u8]]) -> Self {
        Self::from_reply(Reply::Stream {
            status: 200,
            lines: lines.iter().map(|line| line.to_vec()).collect(),
            failure: None,
        })
    }

    /// A 200 reply that yields `lines` and then loses the connection.
    pub(crate) fn failing_after(lines: &[&str], reason: &str) -> Self {
        Self::from_reply(Reply::Stream {
            status: 200,
            lines: to_bytes(lines),
            failure: Some(reason.to_string()),
        })
    }

    pub(crate) fn unreachable() -> Self {
        let mut transport = Self::from_reply(Reply::Unreachable);
        transport.version = None;
        transport
    }

    pub(crate) fn then_ok(self, lines: &[&str]) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Stream {
            status: 200,
            lines: to_bytes(lines),
            failure: None,
        });
        self
    }

    pub(crate) fn lines_read(&self) -> usize {
        self.lines_read.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<(String, serde_json::Value)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceTransport for ScriptedTransport {
    async fn post_streaming(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<StreamingResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), body));

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Stream {
                status,
                lines,
                failure,
            }) => {
                if !(200..300).contains(&status) {
                    let text: Vec<String> = lines
                        .iter()
                        .map(|line| String::from_utf8_lossy(line).into_owned())
                        .collect();
                    return Ok(StreamingResponse::rejected(status, text.join("\n")));
                }

                let counter = self.lines_read.clone();
                let items = lines
                    .into_iter()
                    .map(Ok::<Vec<u8>, TransportError>)
                    .chain(failure.map(|reason| Err(TransportError::Body(reason))));
                let lines = stream::iter(items)
                    .inspect(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .boxed();
                Ok(StreamingResponse::new(status, lines))
            }
            Some(Reply::Unreachable) | None => Err(TransportError::Connect(
                "connection refused".to_string(),
            )),
        }
    }

    async fn get_version(&self, _endpoint: &str) -> Result<String, TransportError> {
        self.version
            .clone()
            .ok_or_else(|| TransportError::Connect("connection refused".to_string()))
    }
}
