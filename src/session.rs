//! Session-scoped conversation state and the per-turn state machine.
//!
//! A `Session` is created when the shell starts and dropped (or reset) when
//! the user leaves; nothing in it is shared across sessions.

use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::analyst::AnalystClient;
use crate::error::{AnalystError, Result};
use crate::feedback::FeedbackClient;
use crate::models::{FeedbackRecord, Message, Rating};
use crate::store::ConversationStore;

/// Where the current user turn stands. `AwaitingResponse` blocks new questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

/// One-shot user notifications, drained once per render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ApiError,
}

impl Notification {
    pub fn text(&self) -> &'static str {
        match self {
            Notification::ApiError => "🚨 An API error has occured!",
        }
    }
}

pub struct Session {
    id: Uuid,
    store: ConversationStore,
    state: TurnState,
    notifications: VecDeque<Notification>,
    analyst: Arc<AnalystClient>,
    feedback: Arc<FeedbackClient>,
}

impl Session {
    pub fn new(analyst: Arc<AnalystClient>, feedback: Arc<FeedbackClient>) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, "Session started");
        Self {
            id,
            store: ConversationStore::new(),
            state: TurnState::Idle,
            notifications: VecDeque::new(),
            analyst,
            feedback,
        }
    }

    /// Discard the conversation and start over with a fresh session id.
    pub fn reset(&mut self) {
        tracing::info!(session = %self.id, messages = self.store.len(), "Session discarded");
        self.id = Uuid::new_v4();
        self.store = ConversationStore::new();
        self.state = TurnState::Idle;
        self.notifications.clear();
        tracing::info!(session = %self.id, "Session started");
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Append a user question and move to `AwaitingResponse`.
    pub fn queue_question(&mut self, question: &str) -> Result<()> {
        if self.state == TurnState::AwaitingResponse {
            return Err(AnalystError::Busy);
        }
        self.store.append(Message::user(question.trim()));
        self.state = TurnState::AwaitingResponse;
        Ok(())
    }

    /// Send the conversation to the analyst and append its answer.
    ///
    /// Any failure becomes an analyst message with `error` set and queues an
    /// `ApiError` notification. Returns `None` when no question is pending.
    pub async fn resolve_turn(&mut self) -> Option<&Message> {
        if self.state != TurnState::AwaitingResponse {
            return None;
        }

        let outcome = self.analyst.ask(self.store.all()).await;
        let message = match outcome {
            Ok(response) => Message::analyst(response),
            Err(e) => {
                tracing::warn!(session = %self.id, "Analyst turn failed: {}", e);
                self.notifications.push_back(Notification::ApiError);
                let request_id = e.request_id().map(str::to_string);
                let mut message = Message::analyst_error(e.to_string(), request_id);
                message.warnings = e.warnings().to_vec();
                message
            }
        };
        self.store.append(message);
        self.state = TurnState::Idle;
        self.store.all().last()
    }

    /// Queue a question and wait for the analyst's answer.
    pub async fn ask(&mut self, question: &str) -> Result<&Message> {
        self.queue_question(question)?;
        self.resolve_turn().await.ok_or(AnalystError::Busy)
    }

    /// Rate an answer. Only the first submission per request id reaches the
    /// service; its outcome, success or failure, is kept for display. Stored
    /// failures carry the service's request id but cannot be rated.
    pub async fn submit_feedback(
        &mut self,
        request_id: &str,
        rating: Rating,
        comment: &str,
    ) -> Result<&FeedbackRecord> {
        if self.store.feedback_for(request_id).is_some() {
            return Err(AnalystError::FeedbackAlreadySubmitted(
                request_id.to_string(),
            ));
        }
        if !self.store.has_request(request_id) {
            return Err(AnalystError::UnknownRequest(request_id.to_string()));
        }
        if !self.store.is_rateable(request_id) {
            return Err(AnalystError::NotRateable(request_id.to_string()));
        }

        let record = match self
            .feedback
            .submit(request_id, rating.is_positive(), comment)
            .await
        {
            Ok(()) => FeedbackRecord::succeeded(request_id),
            Err(e) => FeedbackRecord::failed(request_id, e.to_string()),
        };
        self.store.record_feedback(request_id, record)?;
        self.store
            .feedback_for(request_id)
            .ok_or_else(|| AnalystError::UnknownRequest(request_id.to_string()))
    }

    /// Take every pending notification, leaving the queue empty.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }
}
