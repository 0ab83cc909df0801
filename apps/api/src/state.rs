use std::sync::Arc;

use crate::backend::{AuthService, DataStore, ObjectStore};
use crate::config::Config;
use crate::dashboard::DashboardPoller;
use crate::realtime::ChangeFeed;
use crate::tracking::AnalyticsSink;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Row access. Writes through it are published on `feed`.
    pub store: Arc<dyn DataStore>,
    pub auth: Arc<dyn AuthService>,
    pub objects: Arc<dyn ObjectStore>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub feed: ChangeFeed,
    /// Live dashboard kept fresh in the background; stops when the last clone is dropped.
    pub dashboard: Arc<DashboardPoller>,
    pub config: Config,
}
