//! Axum route handlers for interaction tracking.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::errors::AppError;
use crate::events::recorder::record_event;
use crate::models::analytics::{EventRecord, NewEvent};
use crate::state::AppState;

/// POST /api/v1/events
pub async fn handle_record_event(
    State(state): State<AppState>,
    Json(event): Json<NewEvent>,
) -> Result<(StatusCode, Json<EventRecord>), AppError> {
    let record = record_event(state.store.as_ref(), &event, Utc::now())
        .await
        .map_err(|e| {
            tracing::warn!("Failed to record interaction '{}': {e}", event.kind);
            e
        })?;
    Ok((StatusCode::CREATED, Json(record)))
}
