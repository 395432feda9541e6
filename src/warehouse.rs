use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::error::{AnalystError, Result};
use crate::models::ErrorBody;
use crate::transport::Transport;

/// Tabular result of one SQL statement. Cell values arrive as text or null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Row count reported by the warehouse when larger than `rows`.
    pub total_rows: Option<u64>,
}

impl ResultSet {
    pub fn is_truncated(&self) -> bool {
        self.total_rows
            .is_some_and(|total| total > self.rows.len() as u64)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn query(&self, statement: &str) -> Result<ResultSet>;
}

/// Warehouse, database, schema and role a statement runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(flatten)]
    context: &'a StatementContext,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    result_set_meta_data: ResultSetMetaData,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    num_rows: Option<u64>,
    row_type: Vec<ColumnType>,
    #[serde(default)]
    partition_info: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ColumnType {
    name: String,
}

/// Runs statements through the account's SQL REST endpoint and waits for the
/// first result partition.
pub struct SqlApiWarehouse {
    tx: Arc<dyn Transport>,
    endpoint: String,
    context: StatementContext,
    timeout_seconds: u64,
}

impl SqlApiWarehouse {
    pub fn new(
        tx: Arc<dyn Transport>,
        endpoint: String,
        context: StatementContext,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            tx,
            endpoint,
            context,
            timeout_seconds,
        }
    }
}

#[async_trait]
impl Warehouse for SqlApiWarehouse {
    async fn query(&self, statement: &str) -> Result<ResultSet> {
        let request = StatementRequest {
            statement,
            timeout: self.timeout_seconds,
            context: &self.context,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| AnalystError::Warehouse(format!("Failed to encode statement: {e}")))?;

        tracing::debug!(chars = statement.len(), "Executing statement");
        let raw = self
            .tx
            .post(&self.endpoint, &body)
            .await
            .map_err(|e| AnalystError::Warehouse(e.to_string()))?;

        match raw.status {
            200 => {
                let parsed: StatementResponse = serde_json::from_str(&raw.body).map_err(|e| {
                    AnalystError::Warehouse(format!("Invalid statement response: {e}"))
                })?;
                let meta = parsed.result_set_meta_data;
                if meta.partition_info.len() > 1 {
                    tracing::warn!(
                        partitions = meta.partition_info.len(),
                        "Only the first result partition is shown"
                    );
                }
                Ok(ResultSet {
                    columns: meta.row_type.into_iter().map(|c| c.name).collect(),
                    rows: parsed.data,
                    total_rows: meta.num_rows,
                })
            }
            202 => Err(AnalystError::Warehouse(format!(
                "Statement still running after {} seconds",
                self.timeout_seconds
            ))),
            status => {
                let message = match serde_json::from_str::<serde_json::Value>(&raw.body) {
                    Ok(value) => ErrorBody::from_value(&value).message_or_default(),
                    Err(_) => raw.body.trim().to_string(),
                };
                tracing::warn!(status, "Statement failed: {}", message);
                Err(AnalystError::Warehouse(format!("{message} (status {status})")))
            }
        }
    }
}
