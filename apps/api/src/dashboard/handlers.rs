use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::dashboard::compose::{DashboardTab, TabView};
use crate::dashboard::loader::DashboardLoader;
use crate::dashboard::overview::{load_overview, Overview};
use crate::dashboard::poller::DashboardState;
use crate::errors::AppError;
use crate::events::window::PRESET_DAYS;
use crate::events::WindowPreset;
use crate::state::AppState;
use crate::tracking::summary_days;

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub days: Option<u32>,
    #[serde(default)]
    pub tab: DashboardTab,
}

#[derive(Deserialize)]
pub struct OverviewQuery {
    /// Period of the hosted traffic summary, clamped to 1..=365.
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct TabQuery {
    #[serde(default)]
    pub tab: DashboardTab,
}

#[derive(Deserialize)]
pub struct WindowChange {
    pub days: u32,
}

#[derive(Serialize)]
pub struct WindowResponse {
    pub days: u32,
    pub label: String,
}

impl From<WindowPreset> for WindowResponse {
    fn from(preset: WindowPreset) -> Self {
        Self {
            days: preset.days(),
            label: preset.label(),
        }
    }
}

/// One tab of the poller's current state.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LiveView {
    Loading,
    Ready { view: TabView },
    Error { message: String },
}

impl LiveView {
    pub fn from_state(state: &DashboardState, tab: DashboardTab) -> Self {
        match state {
            DashboardState::Loading => LiveView::Loading,
            DashboardState::Ready { dashboard } => LiveView::Ready {
                view: dashboard.view(tab),
            },
            DashboardState::Error { message } => LiveView::Error {
                message: message.clone(),
            },
        }
    }
}

fn loader(state: &AppState) -> DashboardLoader {
    DashboardLoader::new(state.store.clone(), state.objects.clone())
}

/// GET /api/v1/admin/overview?days=N
pub async fn handle_overview(
    State(state): State<AppState>,
    Query(params): Query<OverviewQuery>,
) -> Result<Json<Overview>, AppError> {
    let overview = load_overview(
        &loader(&state),
        state.analytics.as_ref(),
        Utc::now(),
        summary_days(params.days),
    )
    .await?;
    Ok(Json(overview))
}

/// GET /api/v1/admin/dashboard?days=N&tab=T
/// Composes a fresh snapshot; `days` defaults to the poller's window.
pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<TabView>, AppError> {
    let preset = params
        .days
        .map(WindowPreset::from)
        .unwrap_or_else(|| state.dashboard.window());
    let dashboard = loader(&state).load(preset, Utc::now()).await?;
    Ok(Json(dashboard.view(params.tab)))
}

/// GET /api/v1/admin/dashboard/live?tab=T
pub async fn handle_live(
    State(state): State<AppState>,
    Query(params): Query<TabQuery>,
) -> Json<LiveView> {
    Json(LiveView::from_state(&state.dashboard.state(), params.tab))
}

/// PUT /api/v1/admin/dashboard/window
pub async fn handle_set_window(
    State(state): State<AppState>,
    Json(req): Json<WindowChange>,
) -> Json<WindowResponse> {
    let preset = WindowPreset::from(req.days);
    state.dashboard.set_window(preset);
    tracing::info!("Dashboard window set to '{}'", preset.label());
    Json(preset.into())
}

/// GET /api/v1/admin/dashboard/windows
/// The periods offered by the admin picker.
pub async fn handle_windows() -> Json<Vec<WindowResponse>> {
    Json(
        PRESET_DAYS
            .iter()
            .map(|&days| WindowPreset::from(days).into())
            .collect(),
    )
}

/// GET /api/v1/admin/dashboard/stream?tab=T
/// Sends the current state, then one event per published change.
pub async fn handle_dashboard_stream(
    State(state): State<AppState>,
    Query(params): Query<TabQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(live_events(state.dashboard.subscribe(), params.tab)).keep_alive(KeepAlive::default())
}

fn live_events(
    rx: watch::Receiver<DashboardState>,
    tab: DashboardTab,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((rx, true), move |(mut rx, first)| async move {
        if !first {
            rx.changed().await.ok()?;
        }
        let live = LiveView::from_state(&rx.borrow_and_update(), tab);
        let event = Event::default()
            .event("dashboard")
            .json_data(&live)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Some((Ok(event), (rx, false)))
    })
}
