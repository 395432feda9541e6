pub mod analyst;
pub mod config;
pub mod display;
pub mod error;
pub mod feedback;
pub mod models;
pub mod render;
pub mod session;
pub mod shell;
pub mod store;
pub mod transport;
pub mod warehouse;

use std::sync::Arc;
use std::time::Duration;

use crate::analyst::AnalystClient;
use crate::config::Config;
use crate::error::Result;
use crate::feedback::FeedbackClient;
use crate::render::Renderer;
use crate::session::Session;
use crate::transport::{HttpTransport, Transport};
use crate::warehouse::SqlApiWarehouse;

/// Headroom over the statement timeout so the warehouse can answer first.
const STATEMENT_HTTP_GRACE: Duration = Duration::from_secs(10);

/// Wire the analyst, feedback and warehouse clients for a new session.
pub fn build(cfg: &Config) -> Result<(Session, Renderer)> {
    let source = cfg.semantic_source()?;
    let transport = HttpTransport::new(
        cfg.analyst.account_url.as_str(),
        cfg.analyst.token.as_str(),
        cfg.analyst.token_type.as_str(),
        cfg.analyst_timeout(),
    )?;
    let statement_tx = transport
        .with_timeout(Duration::from_secs(cfg.warehouse.timeout_seconds) + STATEMENT_HTTP_GRACE);
    let transport: Arc<dyn Transport> = Arc::new(transport);

    let analyst = AnalystClient::new(
        Arc::clone(&transport),
        cfg.analyst.message_endpoint.clone(),
        source,
    );
    let feedback = FeedbackClient::new(
        Arc::clone(&transport),
        cfg.analyst.feedback_endpoint.clone(),
    );
    let warehouse = SqlApiWarehouse::new(
        Arc::new(statement_tx),
        cfg.warehouse.statement_endpoint.clone(),
        cfg.statement_context(),
        cfg.warehouse.timeout_seconds,
    );

    tracing::info!(
        account = %cfg.analyst.account_url,
        source = %analyst.source(),
        "Analyst client ready"
    );
    Ok((
        Session::new(Arc::new(analyst), Arc::new(feedback)),
        Renderer::new(Arc::new(warehouse)),
    ))
}
