use std::collections::HashMap;

use crate::error::{AnalystError, Result};
use crate::models::{FeedbackRecord, Message, Role};

/// Append-only conversation history plus per-answer feedback status for one session.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    feedback: HashMap<String, FeedbackRecord>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        tracing::debug!(
            role = %message.role,
            error = message.error,
            position = self.messages.len(),
            "Appending message"
        );
        self.messages.push(message);
    }

    /// Messages in conversation order.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Analyst messages paired with their position among analyst messages, 1-based.
    pub fn answers(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Analyst)
            .enumerate()
            .map(|(i, m)| (i + 1, m))
    }

    pub fn answer(&self, number: usize) -> Option<&Message> {
        self.answers().find(|(n, _)| *n == number).map(|(_, m)| m)
    }

    /// Most recent analyst message that can receive feedback.
    pub fn latest_rateable(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Analyst && !m.error && m.request_id.is_some())
    }

    pub fn has_request(&self, request_id: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.request_id.as_deref() == Some(request_id))
    }

    /// True when `request_id` belongs to a real analyst answer, not a stored failure.
    pub fn is_rateable(&self, request_id: &str) -> bool {
        self.messages.iter().any(|m| {
            m.role == Role::Analyst && !m.error && m.request_id.as_deref() == Some(request_id)
        })
    }

    /// Record the outcome of a feedback submission. A request id keeps its
    /// first record; a second one is refused.
    pub fn record_feedback(&mut self, request_id: &str, record: FeedbackRecord) -> Result<()> {
        if self.feedback.contains_key(request_id) {
            return Err(AnalystError::FeedbackAlreadySubmitted(
                request_id.to_string(),
            ));
        }
        self.feedback.insert(request_id.to_string(), record);
        Ok(())
    }

    pub fn feedback_for(&self, request_id: &str) -> Option<&FeedbackRecord> {
        self.feedback.get(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentItem, ResponseMessage, StructuredResponse};

    fn answer(request_id: &str) -> Message {
        Message::analyst(StructuredResponse {
            message: ResponseMessage {
                role: None,
                content: vec![ContentItem::text("ok")],
            },
            request_id: Some(request_id.to_string()),
            warnings: Vec::new(),
        })
    }

    #[test]
    fn test_append_preserves_order() {
        let mut store = ConversationStore::new();
        assert!(store.is_empty());
        store.append(Message::user("one"));
        store.append(answer("r1"));
        store.append(Message::user("two"));

        let texts: Vec<&str> = store.all().iter().filter_map(Message::first_text).collect();
        assert_eq!(texts, ["one", "ok", "two"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_feedback_recorded_once_per_request() {
        let mut store = ConversationStore::new();
        store
            .record_feedback("r1", FeedbackRecord::succeeded("r1"))
            .unwrap();
        let err = store
            .record_feedback("r1", FeedbackRecord::failed("r1", "late"))
            .unwrap_err();
        assert!(matches!(err, AnalystError::FeedbackAlreadySubmitted(_)));
        assert_eq!(store.feedback_for("r1").unwrap().error, None);
        assert!(store.feedback_for("r2").is_none());
    }

    #[test]
    fn test_answer_lookup_and_latest_rateable() {
        let mut store = ConversationStore::new();
        store.append(Message::user("q1"));
        store.append(answer("r1"));
        store.append(Message::user("q2"));
        store.append(Message::analyst_error("down", Some("r-err".to_string())));

        assert_eq!(store.answers().count(), 2);
        assert_eq!(store.answer(1).unwrap().request_id.as_deref(), Some("r1"));
        assert!(store.answer(2).unwrap().error);
        assert!(store.answer(3).is_none());
        assert_eq!(
            store.latest_rateable().unwrap().request_id.as_deref(),
            Some("r1")
        );
        assert!(store.has_request("r1"));
        assert!(!store.has_request("r2"));
        assert!(store.is_rateable("r1"));
        assert!(store.has_request("r-err"));
        assert!(!store.is_rateable("r-err"));
    }
}
