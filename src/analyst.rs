use std::sync::Arc;

use crate::error::{AnalystError, Result};
use crate::models::{AnalystRequest, ErrorBody, Message, SemanticSource, StructuredResponse};
use crate::transport::{RawResponse, Transport};

/// Longest slice of an unparseable error body echoed back to the user.
const MAX_RAW_ERROR_CHARS: usize = 500;

/// Client for the analyst message endpoint.
pub struct AnalystClient {
    tx: Arc<dyn Transport>,
    endpoint: String,
    source: SemanticSource,
}

impl AnalystClient {
    pub fn new(tx: Arc<dyn Transport>, endpoint: String, source: SemanticSource) -> Self {
        Self {
            tx,
            endpoint,
            source,
        }
    }

    pub fn source(&self) -> &SemanticSource {
        &self.source
    }

    /// Send the whole conversation, in order, and decode the analyst's reply.
    ///
    /// Makes exactly one request; the caller owns the conversation and decides
    /// what to append.
    pub async fn ask(&self, history: &[Message]) -> Result<StructuredResponse> {
        let request = AnalystRequest {
            messages: history.iter().map(Message::to_wire).collect(),
            source: &self.source,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| AnalystError::Decode(format!("Failed to encode analyst request: {e}")))?;

        tracing::info!(
            messages = history.len(),
            source = %self.source,
            "Sending conversation to analyst"
        );
        let raw = self.tx.post(&self.endpoint, &body).await?;
        decode_response(raw)
    }
}

fn decode_response(raw: RawResponse) -> Result<StructuredResponse> {
    if raw.is_ok() {
        let response: StructuredResponse = serde_json::from_str(&raw.body)
            .map_err(|e| AnalystError::Decode(format!("Invalid analyst response: {e}")))?;
        if response.message.content.is_empty() {
            return Err(AnalystError::Decode(
                "Analyst response contained no content".to_string(),
            ));
        }
        tracing::info!(
            request_id = response.request_id.as_deref().unwrap_or("-"),
            items = response.message.content.len(),
            warnings = response.warnings.len(),
            "Analyst answered"
        );
        return Ok(response);
    }

    let body = match serde_json::from_str::<serde_json::Value>(&raw.body) {
        Ok(value) => ErrorBody::from_value(&value),
        Err(_) => {
            let text = raw.body.trim();
            ErrorBody {
                message: (!text.is_empty())
                    .then(|| text.chars().take(MAX_RAW_ERROR_CHARS).collect()),
                ..ErrorBody::default()
            }
        }
    };
    let message = body.message_or_default();
    tracing::warn!(status = raw.status, "Analyst request failed: {}", message);
    Err(AnalystError::Api {
        status: raw.status,
        message,
        request_id: body.request_id,
        warnings: body.warnings,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ContentItem, Role};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Transport replaying canned responses in order and recording what it was sent.
    pub(crate) struct MockTransport {
        responses: Mutex<Vec<Result<RawResponse>>>,
        pub(crate) sent: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl MockTransport {
        pub(crate) fn new(mut responses: Vec<Result<RawResponse>>) -> Self {
            responses.reverse();
            MockTransport {
                responses: Mutex::new(responses),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn sent_bodies(&self) -> Vec<serde_json::Value> {
            self.sent
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .iter()
                .map(|(_, body)| body.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post(&self, endpoint: &str, body: &serde_json::Value) -> Result<RawResponse> {
            self.sent
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .push((endpoint.to_string(), body.clone()));
            self.responses
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .pop()
                .unwrap_or_else(|| Err(AnalystError::Transport("No more mock responses".to_string())))
        }
    }

    pub(crate) fn ok_body(request_id: &str, text: &str, sql: &str) -> RawResponse {
        RawResponse::new(
            200,
            json!({
                "message": {
                    "role": "analyst",
                    "content": [
                        {"type": "text", "text": text},
                        {"type": "sql", "statement": sql}
                    ]
                },
                "request_id": request_id
            })
            .to_string(),
        )
    }

    fn client(tx: Arc<MockTransport>) -> AnalystClient {
        AnalystClient::new(
            tx,
            "/api/v2/cortex/analyst/message".to_string(),
            SemanticSource::SemanticView("development.finops_billrun.invoice_sm_vw".to_string()),
        )
    }

    #[tokio::test]
    async fn test_ask_sends_history_in_order() {
        let tx = Arc::new(MockTransport::new(vec![Ok(ok_body(
            "req-2",
            "Revenue by month",
            "SELECT 1",
        ))]));
        let analyst = client(tx.clone());

        let history = vec![
            Message::user("What's the revenue in October?"),
            Message::analyst_error("earlier failure", None),
            Message::user("And September?"),
        ];
        let response = analyst.ask(&history).await.unwrap();
        assert_eq!(response.request_id.as_deref(), Some("req-2"));
        assert_eq!(response.message.role, Some(Role::Analyst));

        let sent = tx.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (endpoint, body) = &sent[0];
        assert_eq!(endpoint, "/api/v2/cortex/analyst/message");
        assert_eq!(body["semantic_view"], "development.finops_billrun.invoice_sm_vw");
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["user", "analyst", "user"]);
        assert_eq!(body["messages"][0]["content"][0]["text"], "What's the revenue in October?");
        assert_eq!(body["messages"][2]["content"][0]["text"], "And September?");
        assert!(body["messages"][1].get("error").is_none());
        assert!(body["messages"][1].get("request_id").is_none());
    }

    #[tokio::test]
    async fn test_ask_non_200_reports_status_and_message() {
        let tx = Arc::new(MockTransport::new(vec![Ok(RawResponse::new(
            400,
            r#"{"message": "bad semantic view", "request_id": "req-err"}"#,
        ))]));
        let err = client(tx).ask(&[Message::user("q")]).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("bad semantic view"));
        assert_eq!(err.request_id(), Some("req-err"));
    }

    #[tokio::test]
    async fn test_ask_non_200_with_numeric_code_keeps_message() {
        let tx = Arc::new(MockTransport::new(vec![Ok(RawResponse::new(
            400,
            r#"{"code": 392700, "message": "bad semantic view", "request_id": "r9",
                "warnings": [{"message": "view is deprecated"}]}"#,
        ))]));
        let err = client(tx).ask(&[Message::user("q")]).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("bad semantic view"));
        assert!(!text.contains("392700"));
        assert_eq!(err.request_id(), Some("r9"));
        assert_eq!(err.warnings()[0].message, "view is deprecated");
    }

    #[tokio::test]
    async fn test_ask_non_200_without_parseable_body() {
        let tx = Arc::new(MockTransport::new(vec![
            Ok(RawResponse::new(503, "")),
            Ok(RawResponse::new(502, "<html>Bad Gateway</html>")),
        ]));
        let analyst = client(tx);

        let err = analyst.ask(&[Message::user("q")]).await.unwrap_err();
        assert!(matches!(err, AnalystError::Api { status: 503, .. }));
        assert!(err.to_string().contains("No error message"));

        let err = analyst.ask(&[Message::user("q")]).await.unwrap_err();
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[tokio::test]
    async fn test_ask_malformed_200_is_decode_error() {
        let tx = Arc::new(MockTransport::new(vec![
            Ok(RawResponse::new(200, "not json")),
            Ok(RawResponse::new(
                200,
                json!({"message": {"content": []}, "request_id": "r"}).to_string(),
            )),
        ]));
        let analyst = client(tx);
        assert!(matches!(
            analyst.ask(&[Message::user("q")]).await,
            Err(AnalystError::Decode(_))
        ));
        assert!(matches!(
            analyst.ask(&[Message::user("q")]).await,
            Err(AnalystError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_ask_transport_failure_is_surfaced() {
        let tx = Arc::new(MockTransport::new(vec![Err(AnalystError::Transport(
            "request timed out".to_string(),
        ))]));
        let err = client(tx.clone()).ask(&[Message::user("q")]).await.unwrap_err();
        assert!(matches!(err, AnalystError::Transport(_)));
        // Single attempt, no retry.
        assert_eq!(tx.sent_bodies().len(), 1);
    }

    #[tokio::test]
    async fn test_decoded_items_keep_order() {
        let tx = Arc::new(MockTransport::new(vec![Ok(ok_body("r", "first", "SELECT 2"))]));
        let response = client(tx).ask(&[Message::user("q")]).await.unwrap();
        assert_eq!(
            response.message.content,
            vec![ContentItem::text("first"), ContentItem::sql("SELECT 2")]
        );
    }
}
