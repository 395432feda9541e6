use thiserror::Error;

use crate::models::Warning;

/// Errors surfaced by the analyst chat client.
///
/// None of these end a session: analyst failures become an error message in
/// the conversation, SQL failures are shown inline, feedback failures are
/// stored against their request id.
#[derive(Error, Debug)]
pub enum AnalystError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error(
        "🚨 robot down! robot down! 🚨\n\n* response code: `{status}`\n\nMessage:\n```\n{message}\n```"
    )]
    Api {
        status: u16,
        message: String,
        request_id: Option<String>,
        warnings: Vec<Warning>,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("🚨 API returned invalid JSON content. Status: {status}. Error: {detail}")]
    InvalidResponse { status: u16, detail: String },

    #[error("Error retrieving data: {0}")]
    Warehouse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Still waiting for the analyst to answer the previous question")]
    Busy,

    #[error("Feedback already submitted for request {0}")]
    FeedbackAlreadySubmitted(String),

    #[error("No analyst answer with request id {0}")]
    UnknownRequest(String),

    #[error("Request {0} failed, so there is no answer to rate")]
    NotRateable(String),
}

impl AnalystError {
    /// Request id reported by the service alongside a failure, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            AnalystError::Api { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Warnings the service attached to a failed call.
    pub fn warnings(&self) -> &[Warning] {
        match self {
            AnalystError::Api { warnings, .. } => warnings,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for AnalystError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalystError::Transport(format!("request timed out: {err}"))
        } else {
            AnalystError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalystError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_embeds_status_and_message() {
        let err = AnalystError::Api {
            status: 400,
            message: "bad semantic view".to_string(),
            request_id: Some("req-1".to_string()),
            warnings: vec![Warning {
                message: "view is deprecated".to_string(),
            }],
        };
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("bad semantic view"));
        assert_eq!(err.request_id(), Some("req-1"));
        assert!(!text.contains("view is deprecated"));
        assert_eq!(err.warnings()[0].message, "view is deprecated");
    }

    #[test]
    fn test_invalid_response_error_text() {
        let err = AnalystError::InvalidResponse {
            status: 502,
            detail: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "🚨 API returned invalid JSON content. Status: 502. Error: expected value at line 1 column 1"
        );
        assert_eq!(err.request_id(), None);
        assert!(err.warnings().is_empty());
    }

    #[test]
    fn test_warehouse_error_text() {
        let err = AnalystError::Warehouse("SQL compilation error".to_string());
        assert_eq!(err.to_string(), "Error retrieving data: SQL compilation error");
    }
}
