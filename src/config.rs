use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AnalystError, Result};
use crate::models::SemanticSource;
use crate::warehouse::StatementContext;

const DEFAULT_CONFIG_PATH: &str = "analyst-chat.yaml";

/// Main configuration structure for analyst-chat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analyst: AnalystConfig,
    pub warehouse: WarehouseConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalystConfig {
    /// e.g. https://myorg-myaccount.snowflakecomputing.com
    pub account_url: String,
    pub token: String,
    /// KEYPAIR_JWT, PROGRAMMATIC_ACCESS_TOKEN or OAUTH
    pub token_type: String,
    pub message_endpoint: String,
    pub feedback_endpoint: String,
    pub semantic_view: Option<String>,
    /// Stage path to a semantic model YAML, used instead of a semantic view.
    pub semantic_model_file: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub statement_endpoint: String,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub subtitle: String,
    pub tip: String,
    pub input_prompt: String,
    pub example_questions: Vec<String>,
    /// Rows printed per result table.
    pub max_table_rows: usize,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            account_url: String::new(),
            token: String::new(),
            token_type: "KEYPAIR_JWT".to_string(),
            message_endpoint: "/api/v2/cortex/analyst/message".to_string(),
            feedback_endpoint: "/api/v2/cortex/analyst/feedback".to_string(),
            semantic_view: Some("development.finops_billrun.invoice_sm_vw".to_string()),
            semantic_model_file: None,
            timeout_ms: 60_000,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            statement_endpoint: "/api/v2/statements".to_string(),
            warehouse: None,
            database: None,
            schema: None,
            role: None,
            timeout_seconds: 60,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "🤖 FinOps Chatbot".to_string(),
            subtitle: "v0.1 - Agentic AI for Self-Serve Analytics".to_string(),
            tip: "💡 Tip: Be specific in your questions for better results. Include date ranges and metrics you want to analyze.".to_string(),
            input_prompt: "Ask anything about invoices...".to_string(),
            example_questions: vec![
                "What's the revenue in October 2025 compared to September 2025?".to_string(),
                "Which product group had the largest percentage change in revenue from September 2025 to October 2025?".to_string(),
                "How many subscriptions billed in September 2025 were not billed in October 2025?".to_string(),
                "Show me top 10 customers by revenue in October 2025".to_string(),
                "What's the month-over-month revenue growth trend for Q4 2025?".to_string(),
            ],
            max_table_rows: 50,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    ///
    /// Never fails: unreadable or invalid files fall back to defaults and
    /// validation problems are only logged.
    pub fn load(path: Option<&Path>) -> Self {
        for env_path in [".env", "../.env"] {
            if dotenvy::from_path(env_path).is_ok() {
                tracing::info!("Loaded .env from: {}", env_path);
                break;
            }
        }
        Self::load_with(path, |key| env::var(key).ok())
    }

    /// Same as [`Config::load`] minus `.env` handling, reading variables
    /// through `lookup`.
    pub fn load_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config_path: PathBuf = match path {
            Some(p) => p.to_path_buf(),
            None => lookup("ANALYST_CHAT_CONFIG")
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
                .into(),
        };

        let mut config = if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_yaml(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path.display());
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path.display(),
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::debug!(
                "Config file not found at {} - using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply_overrides(lookup);

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {}", e);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| AnalystError::Config(format!("Invalid YAML: {e}")))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SNOWFLAKE_ACCOUNT_URL") {
            self.analyst.account_url = url;
        }
        if let Some(token) = lookup("SNOWFLAKE_TOKEN") {
            self.analyst.token = token;
        }
        if let Some(token_type) = lookup("SNOWFLAKE_TOKEN_TYPE") {
            self.analyst.token_type = token_type;
        }
        if let Some(view) = lookup("ANALYST_SEMANTIC_VIEW") {
            self.analyst.semantic_view = Some(view);
            self.analyst.semantic_model_file = None;
        }
        if let Some(file) = lookup("ANALYST_SEMANTIC_MODEL_FILE") {
            self.analyst.semantic_model_file = Some(file);
            self.analyst.semantic_view = None;
        }
        if let Some(timeout) = lookup("ANALYST_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => self.analyst.timeout_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid ANALYST_TIMEOUT_MS: {}", timeout),
            }
        }

        if let Some(warehouse) = lookup("SNOWFLAKE_WAREHOUSE") {
            self.warehouse.warehouse = Some(warehouse);
        }
        if let Some(database) = lookup("SNOWFLAKE_DATABASE") {
            self.warehouse.database = Some(database);
        }
        if let Some(schema) = lookup("SNOWFLAKE_SCHEMA") {
            self.warehouse.schema = Some(schema);
        }
        if let Some(role) = lookup("SNOWFLAKE_ROLE") {
            self.warehouse.role = Some(role);
        }
    }

    /// The problems that stop the CLI: without an account URL and a token
    /// there is nothing to talk to. Everything else `validate` reports is a
    /// warning.
    pub fn require_credentials(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.analyst.account_url.trim().is_empty() {
            missing.push("analyst.account_url (SNOWFLAKE_ACCOUNT_URL)");
        }
        if self.analyst.token.trim().is_empty() {
            missing.push("analyst.token (SNOWFLAKE_TOKEN)");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AnalystError::Config(format!(
                "{} not set",
                missing.join(" and ")
            )))
        }
    }

    /// Validate configuration, collecting every problem into one message.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut problems = Vec::new();

        if self.analyst.account_url.is_empty() {
            problems.push("analyst.account_url is not set".to_string());
        } else if !self.analyst.account_url.starts_with("http://")
            && !self.analyst.account_url.starts_with("https://")
        {
            problems.push(format!(
                "analyst.account_url must start with http:// or https:// (got {})",
                self.analyst.account_url
            ));
        }
        if self.analyst.token.is_empty() {
            problems.push("analyst.token is not set".to_string());
        }
        if !matches!(
            self.analyst.token_type.as_str(),
            "KEYPAIR_JWT" | "PROGRAMMATIC_ACCESS_TOKEN" | "OAUTH"
        ) {
            problems.push(format!(
                "analyst.token_type '{}' is not one of KEYPAIR_JWT, PROGRAMMATIC_ACCESS_TOKEN, OAUTH",
                self.analyst.token_type
            ));
        }
        if let Err(e) = self.semantic_source() {
            problems.push(e.to_string());
        }
        if self.analyst.timeout_ms == 0 {
            problems.push("analyst.timeout_ms must be greater than 0".to_string());
        }
        if self.warehouse.timeout_seconds == 0 {
            problems.push("warehouse.timeout_seconds must be greater than 0".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }

    /// The one semantic source sent with every question. A semantic model
    /// file, when set, wins over the semantic view.
    pub fn semantic_source(&self) -> Result<SemanticSource> {
        if let Some(file) = self.analyst.semantic_model_file.as_ref().filter(|f| !f.is_empty()) {
            return Ok(SemanticSource::SemanticModelFile(file.clone()));
        }
        match self.analyst.semantic_view.as_ref().filter(|v| !v.is_empty()) {
            Some(view) => Ok(SemanticSource::SemanticView(view.clone())),
            None => Err(AnalystError::Config(
                "one of analyst.semantic_view or analyst.semantic_model_file is required"
                    .to_string(),
            )),
        }
    }

    pub fn analyst_timeout(&self) -> Duration {
        Duration::from_millis(self.analyst.timeout_ms)
    }

    pub fn statement_context(&self) -> StatementContext {
        StatementContext {
            warehouse: self.warehouse.warehouse.clone(),
            database: self.warehouse.database.clone(),
            schema: self.warehouse.schema.clone(),
            role: self.warehouse.role.clone(),
        }
    }
}
