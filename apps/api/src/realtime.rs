//! Realtime row-change notifications.
//!
//! `FeedStore` wraps any `DataStore` and publishes a `RowChange` after each
//! successful write. Subscribers read from a bounded `ChangeFeed`; when a
//! subscriber falls more than `capacity` changes behind, the oldest changes are
//! dropped for that subscriber and it receives `ChangeNotice::Dropped(n)` before
//! resuming with the oldest change still buffered.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::backend::{BackendError, DataStore, RowQuery};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowChange {
    pub table: String,
    pub op: ChangeOp,
    pub row: Value,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeNotice {
    Change(RowChange),
    /// This many changes were discarded because the subscriber lagged.
    Dropped { count: u64 },
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<RowChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, change: RowChange) {
        debug!("change {:?} on {}", change.op, change.table);
        // No subscribers is the common case; the change is simply not delivered.
        let _ = self.tx.send(change);
    }

    /// Subscribes to changes on `table`, or to every table when `None`.
    pub fn subscribe(&self, table: Option<&str>) -> ChangeSubscription {
        ChangeSubscription {
            rx: self.tx.subscribe(),
            table: table.map(str::to_string),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct ChangeSubscription {
    rx: broadcast::Receiver<RowChange>,
    table: Option<String>,
}

impl ChangeSubscription {
    /// Waits for the next notice. `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeNotice> {
        loop {
            match self.rx.recv().await {
                Ok(change) => {
                    if self.table.as_deref().map_or(true, |t| t == change.table) {
                        return Some(ChangeNotice::Change(change));
                    }
                }
                Err(RecvError::Lagged(count)) => return Some(ChangeNotice::Dropped { count }),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Publishing decorator
// ────────────────────────────────────────────────────────────────────────────

pub struct FeedStore {
    inner: Arc<dyn DataStore>,
    feed: ChangeFeed,
}

impl FeedStore {
    pub fn new(inner: Arc<dyn DataStore>, feed: ChangeFeed) -> Self {
        Self { inner, feed }
    }

    fn emit(&self, table: &str, op: ChangeOp, rows: &[Value]) {
        for row in rows {
            self.feed.publish(RowChange {
                table: table.to_string(),
                op,
                row: row.clone(),
                at: Utc::now(),
            });
        }
    }
}

#[async_trait]
impl DataStore for FeedStore {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
        let stored = self.inner.insert(table, row).await?;
        self.emit(table, ChangeOp::Insert, std::slice::from_ref(&stored));
        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        query: &RowQuery,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let rows = self.inner.update(table, query, patch).await?;
        self.emit(table, ChangeOp::Update, &rows);
        Ok(rows)
    }

    async fn delete(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        let rows = self.inner.delete(table, query).await?;
        self.emit(table, ChangeOp::Delete, &rows);
        Ok(rows)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SSE endpoint
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChangeQuery {
    pub table: Option<String>,
}

/// GET /api/v1/admin/changes?table=T
pub async fn handle_change_stream(
    State(state): State<AppState>,
    Query(params): Query<ChangeQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.feed.subscribe(params.table.as_deref());
    debug!(
        "Change stream opened for {} ({} subscribers)",
        params.table.as_deref().unwrap_or("all tables"),
        state.feed.subscriber_count()
    );
    Sse::new(change_events(subscription)).keep_alive(KeepAlive::default())
}

fn change_events(subscription: ChangeSubscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let notice = subscription.next().await?;
        let name = match notice {
            ChangeNotice::Change(_) => "change",
            ChangeNotice::Dropped { .. } => "dropped",
        };
        let event = Event::default()
            .event(name)
            .json_data(&notice)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Some((Ok(event), subscription))
    })
}
