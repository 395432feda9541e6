use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who authored a message. The service calls its own side `analyst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Analyst,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Analyst => write!(f, "analyst"),
        }
    }
}

/// Accepts `true`/`false`, `null`, or the verified-query object the service
/// sends when a pre-validated query answered the question.
fn deserialize_verified_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(_) => Some(true),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    #[serde(
        default,
        deserialize_with = "deserialize_verified_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub verified_query_used: Option<bool>,
}

impl Confidence {
    pub fn is_verified(&self) -> bool {
        self.verified_query_used == Some(true)
    }
}

/// One unit of a structured analyst response.
///
/// The `type` discriminator is checked while decoding; an unknown type is a
/// decode error rather than an item silently skipped at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Sql {
        statement: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<Confidence>,
    },
    Suggestions {
        suggestions: Vec<String>,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    pub fn sql(statement: impl Into<String>) -> Self {
        ContentItem::Sql {
            statement: statement.into(),
            confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A conversation entry held by the session store.
///
/// `request_id`, `error`, `warnings` and `created_at` are bookkeeping and never
/// leave the process; only role and content are sent back to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentItem>,
    pub request_id: Option<String>,
    pub error: bool,
    pub warnings: Vec<Warning>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(question: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentItem::text(question)],
            request_id: None,
            error: false,
            warnings: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn analyst(response: StructuredResponse) -> Self {
        Self {
            role: Role::Analyst,
            content: response.message.content,
            request_id: response.request_id,
            error: false,
            warnings: response.warnings,
            created_at: Utc::now(),
        }
    }

    /// Synthetic analyst message standing in for a failed call.
    pub fn analyst_error(text: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            role: Role::Analyst,
            content: vec![ContentItem::text(text)],
            request_id,
            error: true,
            warnings: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn to_wire(&self) -> WireMessage<'_> {
        WireMessage {
            role: self.role,
            content: &self.content,
        }
    }

    /// First text block, used for user questions and one-line summaries.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|item| match item {
            ContentItem::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Message as sent to the analyst endpoint.
#[derive(Debug, Serialize)]
pub struct WireMessage<'a> {
    pub role: Role,
    pub content: &'a [ContentItem],
}

/// Where the service should read the schema it generates SQL against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticSource {
    SemanticView(String),
    SemanticModelFile(String),
}

impl fmt::Display for SemanticSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticSource::SemanticView(view) => write!(f, "view {view}"),
            SemanticSource::SemanticModelFile(file) => write!(f, "model file {file}"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalystRequest<'a> {
    pub messages: Vec<WireMessage<'a>>,
    #[serde(flatten)]
    pub source: &'a SemanticSource,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<Role>,
    pub content: Vec<ContentItem>,
}

/// Successful body of the analyst message endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructuredResponse {
    pub message: ResponseMessage,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

/// What is read from a body sent with a non-200 status.
///
/// Only string fields are picked out of the JSON; any other shape (numeric
/// codes, a non-object body) leaves the field empty instead of failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub request_id: Option<String>,
    pub warnings: Vec<Warning>,
}

impl ErrorBody {
    pub fn from_value(value: &serde_json::Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };
        let warnings = value
            .get("warnings")
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|w| w.get("message").and_then(serde_json::Value::as_str))
                    .map(|message| Warning {
                        message: message.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            message: text("message"),
            request_id: text("request_id"),
            warnings,
        }
    }

    pub fn message_or_default(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "No error message".to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct FeedbackRequest<'a> {
    pub request_id: &'a str,
    pub positive: bool,
    pub feedback_message: &'a str,
}

/// Outcome of the single feedback submission allowed per request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub request_id: String,
    pub submitted: bool,
    pub error: Option<String>,
}

impl FeedbackRecord {
    pub fn succeeded(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            submitted: true,
            error: None,
        }
    }

    pub fn failed(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            submitted: true,
            error: Some(error.into()),
        }
    }
}

/// Three-way answer rating; only `Great` counts as positive feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Great,
    CouldBeBetter,
    Wrong,
}

impl Rating {
    pub fn is_positive(self) -> bool {
        matches!(self, Rating::Great)
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::Great => "Great",
            Rating::CouldBeBetter => "Could be better",
            Rating::Wrong => "Wrong",
        }
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "great" | "good" | "+" => Ok(Rating::Great),
            "better" | "could-be-better" | "could_be_better" | "meh" => Ok(Rating::CouldBeBetter),
            "wrong" | "bad" | "-" => Ok(Rating::Wrong),
            other => Err(format!(
                "Unknown rating '{other}'. Use one of: great, better, wrong"
            )),
        }
    }
}
