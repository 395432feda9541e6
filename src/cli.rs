//! CLI argument definitions for analyst-chat.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use analyst_chat::config::Config;

/// Chat with a hosted text-to-SQL analyst from the terminal.
#[derive(Parser, Debug)]
#[command(name = "analyst-chat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Account base URL, e.g. https://myorg-myaccount.snowflakecomputing.com
    #[arg(long = "account-url")]
    pub account_url: Option<String>,

    /// Fully qualified semantic view to ask questions against.
    #[arg(long = "semantic-view", conflicts_with = "semantic_model_file")]
    pub semantic_view: Option<String>,

    /// Stage path of a semantic model file, used instead of a semantic view.
    #[arg(long = "semantic-model-file")]
    pub semantic_model_file: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Disable colored output.
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl CliArgs {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.account_url {
            config.analyst.account_url = url.clone();
        }
        if let Some(view) = &self.semantic_view {
            config.analyst.semantic_view = Some(view.clone());
            config.analyst.semantic_model_file = None;
        }
        if let Some(file) = &self.semantic_model_file {
            config.analyst.semantic_model_file = Some(file.clone());
            config.analyst.semantic_view = None;
        }
    }

    /// Log filter directive. Priority: --log-level flag > RUST_LOG > warn.
    pub fn log_filter(&self) -> tracing_subscriber::EnvFilter {
        match self.log_level.as_deref() {
            Some(level) => tracing_subscriber::EnvFilter::new(level),
            None => tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        }
    }
}
