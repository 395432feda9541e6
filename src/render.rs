use std::sync::Arc;

use crate::models::{ContentItem, FeedbackRecord, Message, Role};
use crate::warehouse::{ResultSet, Warehouse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    /// A verified query answered the question.
    High,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackView {
    /// The answer can still be rated.
    Prompt { request_id: String },
    Submitted,
    Failed(String),
}

/// One displayable piece of a rendered message, in display order.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Question(String),
    Text(String),
    Table(ResultSet),
    Confidence(ConfidenceLevel),
    SqlError(String),
    Suggestions(Vec<String>),
    Error(String),
    Feedback(FeedbackView),
    Warnings(Vec<String>),
}

/// Turns conversation messages into display blocks, running returned SQL
/// against the warehouse as it goes.
pub struct Renderer {
    warehouse: Arc<dyn Warehouse>,
}

impl Renderer {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Emit blocks for `message` to `emit` as soon as each is ready, so earlier
    /// items are shown before later statements execute.
    ///
    /// A failing statement yields an inline `SqlError` and rendering moves on.
    pub async fn render_into<F>(
        &self,
        message: &Message,
        feedback: Option<&FeedbackRecord>,
        mut emit: F,
    ) where
        F: FnMut(Block),
    {
        match message.role {
            Role::User => {
                emit(Block::Question(
                    message.first_text().unwrap_or_default().to_string(),
                ));
                return;
            }
            Role::Analyst if message.error => {
                let text = message
                    .content
                    .iter()
                    .filter_map(|item| match item {
                        ContentItem::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                emit(Block::Error(text));
                emit_warnings(message, &mut emit);
                return;
            }
            Role::Analyst => {}
        }

        for item in &message.content {
            match item {
                ContentItem::Text { text } => emit(Block::Text(text.clone())),
                ContentItem::Sql {
                    statement,
                    confidence,
                } => match self.warehouse.query(statement).await {
                    Ok(result) => {
                        emit(Block::Table(result));
                        if let Some(confidence) = confidence {
                            emit(Block::Confidence(if confidence.is_verified() {
                                ConfidenceLevel::High
                            } else {
                                ConfidenceLevel::Moderate
                            }));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            request_id = message.request_id.as_deref().unwrap_or("-"),
                            "Statement from analyst failed: {}",
                            e
                        );
                        emit(Block::SqlError(e.to_string()));
                    }
                },
                ContentItem::Suggestions { suggestions } => {
                    emit(Block::Suggestions(suggestions.clone()))
                }
            }
        }

        if let Some(request_id) = &message.request_id {
            let view = match feedback {
                None => FeedbackView::Prompt {
                    request_id: request_id.clone(),
                },
                Some(FeedbackRecord { error: None, .. }) => FeedbackView::Submitted,
                Some(FeedbackRecord {
                    error: Some(error), ..
                }) => FeedbackView::Failed(error.clone()),
            };
            emit(Block::Feedback(view));
        }

        emit_warnings(message, &mut emit);
    }

    pub async fn render(
        &self,
        message: &Message,
        feedback: Option<&FeedbackRecord>,
    ) -> Vec<Block> {
        let mut blocks = Vec::new();
        self.render_into(message, feedback, |block| blocks.push(block))
            .await;
        blocks
    }
}

fn emit_warnings<F: FnMut(Block)>(message: &Message, emit: &mut F) {
    if !message.warnings.is_empty() {
        emit(Block::Warnings(
            message.warnings.iter().map(|w| w.message.clone()).collect(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalystError;
    use crate::models::{Confidence, ResponseMessage, StructuredResponse, Warning};
    use crate::warehouse::MockWarehouse;
    use std::sync::Mutex;

    fn table(value: &str) -> ResultSet {
        ResultSet {
            columns: vec!["VALUE".to_string()],
            rows: vec![vec![Some(value.to_string())]],
            total_rows: Some(1),
        }
    }

    fn answer(content: Vec<ContentItem>, request_id: Option<&str>, warnings: Vec<&str>) -> Message {
        Message::analyst(StructuredResponse {
            message: ResponseMessage {
                role: None,
                content,
            },
            request_id: request_id.map(str::to_string),
            warnings: warnings
                .into_iter()
                .map(|w| Warning {
                    message: w.to_string(),
                })
                .collect(),
        })
    }

    #[tokio::test]
    async fn test_text_is_emitted_before_sql_executes() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut warehouse = MockWarehouse::new();
        let query_log = log.clone();
        warehouse.expect_query().times(1).returning(move |sql| {
            query_log.lock().unwrap().push(format!("query {sql}"));
            Ok(table("42"))
        });
        let renderer = Renderer::new(Arc::new(warehouse));

        let message = answer(
            vec![
                ContentItem::text("Here is the revenue"),
                ContentItem::sql("SELECT 42"),
            ],
            Some("r1"),
            vec![],
        );
        let emit_log = log.clone();
        renderer
            .render_into(&message, None, |block| {
                let entry = match block {
                    Block::Text(t) => format!("text {t}"),
                    Block::Table(_) => "table".to_string(),
                    Block::Feedback(_) => "feedback".to_string(),
                    other => format!("{other:?}"),
                };
                emit_log.lock().unwrap().push(entry);
            })
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            [
                "text Here is the revenue",
                "query SELECT 42",
                "table",
                "feedback"
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_statement_does_not_stop_later_items() {
        let mut warehouse = MockWarehouse::new();
        warehouse
            .expect_query()
            .withf(|sql| sql.starts_with("SELECT bad"))
            .times(1)
            .returning(|_| Err(AnalystError::Warehouse("SQL compilation error".to_string())));
        warehouse
            .expect_query()
            .withf(|sql| sql.starts_with("SELECT good"))
            .times(1)
            .returning(|_| Ok(table("ok")));
        let renderer = Renderer::new(Arc::new(warehouse));

        let message = answer(
            vec![
                ContentItem::sql("SELECT bad"),
                ContentItem::text("after the failure"),
                ContentItem::sql("SELECT good"),
            ],
            None,
            vec![],
        );
        let blocks = renderer.render(&message, None).await;
        assert_eq!(
            blocks,
            vec![
                Block::SqlError("Error retrieving data: SQL compilation error".to_string()),
                Block::Text("after the failure".to_string()),
                Block::Table(table("ok")),
            ]
        );
    }

    #[tokio::test]
    async fn test_confidence_levels() {
        let mut warehouse = MockWarehouse::new();
        warehouse.expect_query().times(3).returning(|_| Ok(table("1")));
        let renderer = Renderer::new(Arc::new(warehouse));

        let message = answer(
            vec![
                ContentItem::Sql {
                    statement: "SELECT 1".to_string(),
                    confidence: Some(Confidence {
                        verified_query_used: Some(true),
                    }),
                },
                ContentItem::Sql {
                    statement: "SELECT 1".to_string(),
                    confidence: Some(Confidence::default()),
                },
                ContentItem::sql("SELECT 1"),
            ],
            None,
            vec![],
        );
        let levels: Vec<ConfidenceLevel> = renderer
            .render(&message, None)
            .await
            .into_iter()
            .filter_map(|b| match b {
                Block::Confidence(level) => Some(level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, [ConfidenceLevel::High, ConfidenceLevel::Moderate]);
    }

    #[tokio::test]
    async fn test_feedback_view_and_warnings_follow_items() {
        let renderer = Renderer::new(Arc::new(MockWarehouse::new()));
        let message = answer(
            vec![ContentItem::Suggestions {
                suggestions: vec!["Revenue by region?".to_string()],
            }],
            Some("r7"),
            vec!["Results limited to 100 rows"],
        );

        let blocks = renderer.render(&message, None).await;
        assert_eq!(
            blocks,
            vec![
                Block::Suggestions(vec!["Revenue by region?".to_string()]),
                Block::Feedback(FeedbackView::Prompt {
                    request_id: "r7".to_string()
                }),
                Block::Warnings(vec!["Results limited to 100 rows".to_string()]),
            ]
        );

        let done = FeedbackRecord::succeeded("r7");
        let blocks = renderer.render(&message, Some(&done)).await;
        assert!(blocks.contains(&Block::Feedback(FeedbackView::Submitted)));

        let failed = FeedbackRecord::failed("r7", "status 500");
        let blocks = renderer.render(&message, Some(&failed)).await;
        assert!(blocks.contains(&Block::Feedback(FeedbackView::Failed(
            "status 500".to_string()
        ))));
    }

    #[tokio::test]
    async fn test_error_and_user_messages_run_no_sql() {
        let renderer = Renderer::new(Arc::new(MockWarehouse::new()));

        let failure = Message::analyst_error("robot down (status 400)", Some("r".to_string()));
        let blocks = renderer.render(&failure, None).await;
        assert_eq!(
            blocks,
            vec![Block::Error("robot down (status 400)".to_string())]
        );

        let mut warned = failure.clone();
        warned.warnings = vec![Warning {
            message: "view is deprecated".to_string(),
        }];
        let blocks = renderer.render(&warned, None).await;
        assert_eq!(
            blocks,
            vec![
                Block::Error("robot down (status 400)".to_string()),
                Block::Warnings(vec!["view is deprecated".to_string()]),
            ]
        );

        let blocks = renderer.render(&Message::user("How many?"), None).await;
        assert_eq!(blocks, vec![Block::Question("How many?".to_string())]);
    }
}
