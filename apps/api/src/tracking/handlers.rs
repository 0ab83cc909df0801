use axum::{
    extract::State,
    http::{
        header::{REFERER, USER_AGENT},
        HeaderMap, StatusCode,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SiteFlags;
use crate::errors::AppError;
use crate::state::AppState;
use crate::tracking::classify::{DeviceClass, TrafficSource, VisitorKind};
use crate::tracking::{AnalyticsError, TrackEvent};

#[derive(Deserialize)]
pub struct PageViewRequest {
    pub page: String,
    pub title: Option<String>,
    #[serde(default)]
    pub returning: bool,
    /// Stable visitor id kept by the browser; a fresh one is issued when absent.
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PageViewResponse {
    pub client_id: String,
    pub device: DeviceClass,
    pub source: TrafficSource,
    pub visitor: VisitorKind,
    pub forwarded: bool,
}

/// A custom `(category, action, label?)` hit, e.g. `Engagement/ScrollDepth/50%`
/// or `Interaction/button/agendar`.
#[derive(Deserialize)]
pub struct CustomEventRequest {
    pub category: String,
    pub action: String,
    pub label: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomEventResponse {
    pub client_id: String,
    pub forwarded: bool,
}

fn header<'a>(headers: &'a HeaderMap, name: axum::http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// The hits one page load produces: the page view plus the device, traffic,
/// visitor and page events.
pub fn page_view_events(
    req: &PageViewRequest,
    device: DeviceClass,
    source: TrafficSource,
    visitor: VisitorKind,
) -> Vec<TrackEvent> {
    vec![
        TrackEvent::page_view(&req.page, req.title.as_deref()),
        TrackEvent::custom("Device", device.as_str(), None),
        TrackEvent::custom("Traffic", source.as_str(), None),
        TrackEvent::custom("User", visitor.as_str(), None),
        TrackEvent::custom("Page", "View", Some(&req.page)),
    ]
}

/// POST /api/v1/track/pageview
/// Tracking is best-effort: an unreachable or unconfigured analytics
/// property is reported as `forwarded: false`, never as an error.
pub async fn handle_track_pageview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PageViewRequest>,
) -> Result<(StatusCode, Json<PageViewResponse>), AppError> {
    if req.page.trim().is_empty() {
        return Err(AppError::Validation("page is required".to_string()));
    }

    let device = DeviceClass::from_user_agent(header(&headers, USER_AGENT).unwrap_or_default());
    let source = TrafficSource::from_referrer(header(&headers, REFERER));
    let visitor = VisitorKind::from_flag(req.returning);
    let client_id = client_id_or_new(req.client_id.as_deref());

    let events = page_view_events(&req, device, source, visitor);
    let forwarded = forward(&state, &client_id, events, &req.page).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(PageViewResponse {
            client_id,
            device,
            source,
            visitor,
            forwarded,
        }),
    ))
}

/// POST /api/v1/track/event
/// Same best-effort contract as page views.
pub async fn handle_track_event(
    State(state): State<AppState>,
    Json(req): Json<CustomEventRequest>,
) -> Result<(StatusCode, Json<CustomEventResponse>), AppError> {
    let category = req.category.trim();
    let action = req.action.trim();
    if category.is_empty() || action.is_empty() {
        return Err(AppError::Validation(
            "category and action are required".to_string(),
        ));
    }

    let client_id = client_id_or_new(req.client_id.as_deref());
    let label = req.label.as_deref().filter(|l| !l.trim().is_empty());
    let event = TrackEvent::custom(category, action, label);
    let what = format!("{category}/{action}");
    let forwarded = forward(&state, &client_id, vec![event], &what).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(CustomEventResponse {
            client_id,
            forwarded,
        }),
    ))
}

fn client_id_or_new(requested: Option<&str>) -> String {
    requested
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Sends `events`, reporting whether they reached the property. Never fails.
async fn forward(state: &AppState, client_id: &str, events: Vec<TrackEvent>, what: &str) -> bool {
    match state.analytics.send(client_id, events).await {
        Ok(()) => true,
        Err(AnalyticsError::Disabled) => {
            debug!("Analytics disabled; {what} not forwarded");
            false
        }
        Err(e) => {
            warn!("Failed to forward {what}: {e}");
            false
        }
    }
}

/// GET /api/v1/site/flags
pub async fn handle_site_flags(State(state): State<AppState>) -> Json<SiteFlags> {
    Json(state.config.flags.clone())
}
