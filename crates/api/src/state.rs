use std::sync::Arc;

use rebate_core::service::RebateService;
use rebate_events::EventBus;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; everything inside is behind an `Arc` or is a handle.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RebateService>,
    pub config: Arc<ServerConfig>,
    /// Publishes domain events after successful commands.
    pub event_bus: Arc<EventBus>,
    /// Present in Postgres mode; used by the health check.
    pub pool: Option<rebate_db::DbPool>,
    /// Cancelled on shutdown. In-flight validation runs observe a child
    /// token and abandon without committing.
    pub shutdown: CancellationToken,
}
