use std::sync::Arc;

use chrono::SecondsFormat;
use tracing::{debug, warn};

use crate::backend::query::Filter;
use crate::backend::{decode_row, BackendError, DataStore, Direction, RowQuery};
use crate::events::window::DateWindow;
use crate::models::analytics::{EventRecord, RawEventRow, ANALYTICS_TABLE};
use crate::models::content::EntityKind;

/// Loads interaction records for a window.
///
/// All matching rows are loaded at once; there is no pagination. Transport
/// and backend errors are returned as-is; the reader never retries.
#[derive(Clone)]
pub struct EventLogReader {
    store: Arc<dyn DataStore>,
}

impl EventLogReader {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Records with `window.start <= timestamp <= window.end`, optionally of one type.
    /// Rows that fail validation are logged and skipped.
    pub async fn read(
        &self,
        window: &DateWindow,
        kind: Option<&str>,
    ) -> Result<Vec<EventRecord>, BackendError> {
        // AutoSi keeps full precision so the backend bound matches `window.contains`.
        let mut query = RowQuery::new()
            .gte(
                "timestamp",
                window.start.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )
            .lte(
                "timestamp",
                window.end.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            );
        if let Some(kind) = kind {
            query = query.eq("tipo", kind);
        }

        let rows = self.store.select(ANALYTICS_TABLE, &query).await?;
        let fetched = rows.len();
        // The backend already filtered, but rows are not trusted to honour it.
        let records = validate_rows(rows, |record| {
            let inside = window.contains(record.timestamp);
            if !inside {
                warn!(
                    "Skipping analytics row: timestamp {} outside requested window",
                    record.timestamp
                );
            }
            inside
        });
        debug!(
            "Read {} of {} analytics rows for {} .. {}",
            records.len(),
            fetched,
            window.start,
            window.end
        );
        Ok(records)
    }

    /// Click and WhatsApp records that reference one entity, newest first.
    pub async fn for_entity(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> Result<Vec<EventRecord>, BackendError> {
        let tracked: Vec<Filter> = kind
            .click_kinds()
            .iter()
            .chain(kind.whatsapp_kinds())
            .map(|k| Filter::Eq("tipo".to_string(), k.to_string()))
            .collect();
        let query = RowQuery::new()
            .any_of(tracked)
            .eq(kind.analytics_column(), id)
            .order_by("timestamp", Direction::Desc);

        let rows = self.store.select(ANALYTICS_TABLE, &query).await?;
        Ok(validate_rows(rows, |record| record.foreign_id == Some(id)))
    }
}

/// Decodes and validates raw rows, keeping those `keep` accepts.
fn validate_rows(
    rows: Vec<serde_json::Value>,
    keep: impl Fn(&EventRecord) -> bool,
) -> Vec<EventRecord> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: RawEventRow = match decode_row(ANALYTICS_TABLE, row) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping analytics row: {e}");
                continue;
            }
        };
        let id = raw.id.clone();
        match EventRecord::try_from(raw) {
            Ok(record) if keep(&record) => records.push(record),
            Ok(_) => {}
            Err(rejection) => warn!("Skipping analytics row {:?}: {rejection}", id),
        }
    }
    records
}
