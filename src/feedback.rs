use std::sync::Arc;

use crate::error::{AnalystError, Result};
use crate::models::{ErrorBody, FeedbackRequest};
use crate::transport::Transport;

/// Client for the answer-feedback endpoint.
pub struct FeedbackClient {
    tx: Arc<dyn Transport>,
    endpoint: String,
}

impl FeedbackClient {
    pub fn new(tx: Arc<dyn Transport>, endpoint: String) -> Self {
        Self { tx, endpoint }
    }

    /// Submit a rating and free-text comment for one analyst answer.
    ///
    /// A 200 succeeds with no body or any JSON body. A non-empty body that is not JSON
    /// is reported as an invalid response, separately from a plain API error.
    pub async fn submit(&self, request_id: &str, positive: bool, comment: &str) -> Result<()> {
        let request = FeedbackRequest {
            request_id,
            positive,
            feedback_message: comment,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| AnalystError::Decode(format!("Failed to encode feedback: {e}")))?;

        tracing::info!(request_id, positive, "Submitting feedback");
        let raw = self.tx.post(&self.endpoint, &body).await?;

        let parsed = if raw.body.trim().is_empty() {
            ErrorBody::default()
        } else {
            let value = serde_json::from_str::<serde_json::Value>(&raw.body).map_err(|e| {
                AnalystError::InvalidResponse {
                    status: raw.status,
                    detail: e.to_string(),
                }
            })?;
            ErrorBody::from_value(&value)
        };

        if raw.is_ok() {
            return Ok(());
        }

        tracing::warn!(request_id, status = raw.status, "Feedback rejected");
        Err(AnalystError::Api {
            status: raw.status,
            message: parsed.message_or_default(),
            request_id: Some(request_id.to_string()),
            warnings: parsed.warnings,
        })
    }
}
