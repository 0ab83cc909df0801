use chrono::{DateTime, Utc};
use tracing::info;

use crate::backend::DataStore;
use crate::errors::AppError;
use crate::models::analytics::{parse_timestamp, EventRecord, NewEvent, ANALYTICS_TABLE};

/// Validates and stores one interaction. Validation failures never reach the backend.
pub async fn record_event(
    store: &dyn DataStore,
    event: &NewEvent,
    now: DateTime<Utc>,
) -> Result<EventRecord, AppError> {
    let row = event.to_row(now).map_err(AppError::Validation)?;
    let stored = store.insert(ANALYTICS_TABLE, row).await?;
    info!(
        "Recorded interaction '{}' (foreign id {:?})",
        event.kind.trim(),
        event.foreign_id
    );
    Ok(EventRecord {
        kind: event.kind.trim().to_string(),
        foreign_id: event.foreign_id,
        timestamp: stored
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp)
            .unwrap_or(now),
    })
}
