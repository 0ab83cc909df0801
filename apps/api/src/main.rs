mod analytics;
mod auth;
mod backend;
mod config;
mod content;
mod dashboard;
mod errors;
mod events;
mod models;
mod realtime;
mod routes;
mod state;
mod tracking;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::backend::storage::S3ObjectStore;
use crate::backend::{AuthService, BackendClient, DataStore, ObjectStore, Unconfigured};
use crate::config::Config;
use crate::dashboard::{DashboardLoader, DashboardPoller};
use crate::events::WindowPreset;
use crate::realtime::{ChangeFeed, FeedStore};
use crate::routes::build_router;
use crate::state::AppState;
use crate::tracking::{AnalyticsSink, DisabledAnalytics, HostedAnalytics};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails only on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Nirvana API v{}", env!("CARGO_PKG_VERSION"));

    // Hosted backend: rows + auth, or a stand-in that fails every call
    let (rows, auth): (Arc<dyn DataStore>, Arc<dyn AuthService>) = match &config.backend {
        Some(settings) => {
            let client = Arc::new(BackendClient::new(settings)?);
            info!("Backend client initialized ({})", client.base_url());
            let rows: Arc<dyn DataStore> = client.clone();
            let auth: Arc<dyn AuthService> = client;
            (rows, auth)
        }
        None => {
            warn!("BACKEND_URL / BACKEND_API_KEY not set; dashboard will stay in its error state");
            let missing = Arc::new(Unconfigured::new("BACKEND_URL and BACKEND_API_KEY"));
            let rows: Arc<dyn DataStore> = missing.clone();
            let auth: Arc<dyn AuthService> = missing;
            (rows, auth)
        }
    };

    // Realtime: every write through the store is published on the feed
    let feed = ChangeFeed::new(config.change_feed_capacity);
    let store: Arc<dyn DataStore> = Arc::new(FeedStore::new(rows, feed.clone()));

    // Object storage through the backend's S3-compatible endpoint
    let objects: Arc<dyn ObjectStore> = match (&config.backend, &config.storage) {
        (Some(backend), Some(storage)) => {
            let s3 = S3ObjectStore::connect(backend, storage).await;
            info!("Object storage client initialized");
            Arc::new(s3)
        }
        _ => {
            warn!("Storage credentials not set; image uploads will fail");
            Arc::new(Unconfigured::new(
                "STORAGE_ACCESS_KEY_ID and STORAGE_SECRET_ACCESS_KEY",
            ))
        }
    };

    // Hosted web analytics (optional)
    let analytics: Arc<dyn AnalyticsSink> = match &config.analytics {
        Some(settings) => {
            info!("Hosted analytics enabled ({})", settings.measurement_id);
            Arc::new(HostedAnalytics::new(settings.clone())?)
        }
        None => {
            info!("Hosted analytics disabled");
            Arc::new(DisabledAnalytics)
        }
    };

    // Live dashboard
    let dashboard = Arc::new(DashboardPoller::spawn(
        DashboardLoader::new(store.clone(), objects.clone()),
        WindowPreset::from(config.default_window_days),
        config.poll_interval,
    ));

    // Build app state
    let state = AppState {
        store,
        auth,
        objects,
        analytics,
        feed,
        dashboard: dashboard.clone(),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the public site and admin hosts

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dashboard.shutdown();
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
