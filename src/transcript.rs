use crate::llm_types::{ChatMessage, Role};
use crate::metrics::ResponseMetrics;

/// Chat history for one session.
///
/// `metrics[i]` belongs to the i-th assistant message. Assistant messages
/// and their metrics are only ever appended together, so the two sequences
/// cannot drift apart.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    metrics: Vec<ResponseMetrics>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Record a completed exchange.
    pub fn commit_exchange(&mut self, text: impl Into<String>, metrics: ResponseMetrics) {
        self.messages.push(ChatMessage::assistant(text));
        self.metrics.push(metrics);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn metrics(&self) -> &[ResponseMetrics] {
        &self.metrics
    }

    /// Metrics for the message at `index`, if it is an assistant reply.
    pub fn metrics_for_message(&self, index: usize) -> Option<&ResponseMetrics> {
        let message = self.messages.get(index)?;
        if message.role() != Role::Assistant {
            return None;
        }
        let ordinal = self.messages[..index]
            .iter()
            .filter(|m| m.role() == Role::Assistant)
            .count();
        self.metrics.get(ordinal)
    }

    pub fn last_metrics(&self) -> Option<&ResponseMetrics> {
        self.metrics.last()
    }

    pub fn assistant_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role() == Role::Assistant)
            .count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.metrics.clear();
    }
}
