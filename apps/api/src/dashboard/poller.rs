//! Dashboard poller. Keeps one live `SiteDashboard` fresh for the admin UI.
//!
//! A single task owns the refresh loop. It fetches on start, every
//! `interval`, and whenever the window changes. A window change drops the
//! in-flight fetch before starting the next one, so a slow fetch for an old
//! window can never overwrite a newer result. Snapshots are published through
//! a `watch` channel only when they differ by value from the current state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::backend::BackendError;
use crate::dashboard::compose::SiteDashboard;
use crate::dashboard::loader::DashboardLoader;
use crate::events::WindowPreset;

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    Loading,
    Ready { dashboard: Arc<SiteDashboard> },
    Error { message: String },
}

type PendingFetch = Pin<Box<dyn Future<Output = Result<SiteDashboard, BackendError>> + Send>>;

pub struct DashboardPoller {
    window_tx: watch::Sender<WindowPreset>,
    state_rx: watch::Receiver<DashboardState>,
    task: JoinHandle<()>,
}

impl DashboardPoller {
    /// Starts the refresh loop. The first fetch begins immediately.
    pub fn spawn(loader: DashboardLoader, initial: WindowPreset, interval: Duration) -> Self {
        let (window_tx, window_rx) = watch::channel(initial);
        let (state_tx, state_rx) = watch::channel(DashboardState::Loading);
        let task = tokio::spawn(run(loader, window_rx, state_tx, interval));
        info!(
            "Dashboard poller started (window '{}', every {}s)",
            initial.label(),
            interval.as_secs()
        );
        Self {
            window_tx,
            state_rx,
            task,
        }
    }

    pub fn state(&self) -> DashboardState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state_rx.clone()
    }

    pub fn window(&self) -> WindowPreset {
        *self.window_tx.borrow()
    }

    /// Switches the window and refetches at once, even if `preset` is unchanged.
    pub fn set_window(&self, preset: WindowPreset) {
        self.window_tx.send_replace(preset);
    }

    /// Stops the loop. Subscribers observe the channel closing.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for DashboardPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    loader: DashboardLoader,
    mut window_rx: watch::Receiver<WindowPreset>,
    state_tx: watch::Sender<DashboardState>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut preset = *window_rx.borrow_and_update();
    let mut pending: Option<PendingFetch> = None;

    loop {
        tokio::select! {
            _ = ticker.tick(), if pending.is_none() => {
                pending = Some(fetch(&loader, preset));
            }
            changed = window_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                preset = *window_rx.borrow_and_update();
                if pending.take().is_some() {
                    debug!("Window changed to '{}'; dropped in-flight fetch", preset.label());
                }
                pending = Some(fetch(&loader, preset));
                ticker.reset();
            }
            result = async {
                match pending.as_mut() {
                    Some(in_flight) => in_flight.await,
                    None => std::future::pending().await,
                }
            }, if pending.is_some() => {
                pending = None;
                publish(&state_tx, result);
            }
        }
    }
    debug!("Dashboard poller stopped");
}

fn fetch(loader: &DashboardLoader, preset: WindowPreset) -> PendingFetch {
    let loader = loader.clone();
    Box::pin(async move { loader.load(preset, Utc::now()).await })
}

fn publish(state_tx: &watch::Sender<DashboardState>, result: Result<SiteDashboard, BackendError>) {
    let next = match result {
        Ok(dashboard) => DashboardState::Ready {
            dashboard: Arc::new(dashboard),
        },
        Err(e) => {
            error!("Dashboard refresh failed: {e}");
            DashboardState::Error {
                message: e.to_string(),
            }
        }
    };
    let changed = state_tx.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
    if changed {
        debug!("Published new dashboard state");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::backend::memory::{MemoryObjects, MemoryStore};
    use crate::backend::{DataStore, RowQuery, Unconfigured};
    use crate::models::analytics::ANALYTICS_TABLE;

    /// Delays analytics reads and counts how many finished.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
        completed: AtomicUsize,
    }

    #[async_trait]
    impl DataStore for SlowStore {
        async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
            if table == ANALYTICS_TABLE {
                tokio::time::sleep(self.delay).await;
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.select(table, query).await
        }
        async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
            self.inner.insert(table, row).await
        }
        async fn update(&self, table: &str, q: &RowQuery, patch: Value) -> Result<Vec<Value>, BackendError> {
            self.inner.update(table, q, patch).await
        }
        async fn delete(&self, table: &str, q: &RowQuery) -> Result<Vec<Value>, BackendError> {
            self.inner.delete(table, q).await
        }
    }

    fn event(kind: &str) -> Value {
        json!({
            "tipo": kind,
            "timestamp": (Utc::now() - chrono::Duration::minutes(5)).to_rfc3339(),
        })
    }

    async fn wait_ready(rx: &mut watch::Receiver<DashboardState>) -> Arc<SiteDashboard> {
        let state = rx
            .wait_for(|s| matches!(s, DashboardState::Ready { .. }))
            .await
            .unwrap()
            .clone();
        match state {
            DashboardState::Ready { dashboard } => dashboard,
            _ => unreachable!(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_only_on_change() {
        let store = Arc::new(MemoryStore::new());
        store.seed(ANALYTICS_TABLE, vec![event("whatsapp_footer")]);
        let loader = DashboardLoader::new(store.clone(), Arc::new(MemoryObjects::default()));
        let poller = DashboardPoller::spawn(loader, WindowPreset::LastDays(7), Duration::from_secs(30));
        let mut rx = poller.subscribe();

        let first = wait_ready(&mut rx).await;
        assert_eq!(first.whatsapp[1].clicks, 1);
        rx.borrow_and_update();

        // Same data on the next poll: nothing is published.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!rx.has_changed().unwrap());

        store.seed(ANALYTICS_TABLE, vec![event("whatsapp_footer")]);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.has_changed().unwrap());
        let second = wait_ready(&mut rx).await;
        assert_eq!(second.whatsapp[1].clicks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_change_cancels_in_flight_fetch() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_secs(10),
            completed: AtomicUsize::new(0),
        });
        let loader = DashboardLoader::new(store.clone(), Arc::new(MemoryObjects::default()));
        let poller = DashboardPoller::spawn(loader, WindowPreset::LastDays(7), Duration::from_secs(30));
        let mut rx = poller.subscribe();

        tokio::time::sleep(Duration::from_secs(1)).await;
        poller.set_window(WindowPreset::AllTime);

        let dashboard = wait_ready(&mut rx).await;
        assert_eq!(dashboard.window, WindowPreset::AllTime);
        // The 7-day fetch was dropped before its read finished.
        assert_eq!(store.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_state_is_re_enterable() {
        let store = Arc::new(MemoryStore::new());
        store.fail_table(ANALYTICS_TABLE);
        let loader = DashboardLoader::new(store.clone(), Arc::new(MemoryObjects::default()));
        let poller = DashboardPoller::spawn(loader, WindowPreset::Today, Duration::from_secs(30));
        let mut rx = poller.subscribe();

        rx.wait_for(|s| matches!(s, DashboardState::Error { .. }))
            .await
            .unwrap();

        store.heal_table(ANALYTICS_TABLE);
        wait_ready(&mut rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_backend_reports_error() {
        let store = Arc::new(Unconfigured::new("BACKEND_URL"));
        let loader = DashboardLoader::new(store.clone(), store);
        let poller = DashboardPoller::spawn(loader, WindowPreset::Today, Duration::from_secs(30));
        let mut rx = poller.subscribe();

        let state = rx
            .wait_for(|s| !matches!(s, DashboardState::Loading))
            .await
            .unwrap()
            .clone();
        match state {
            DashboardState::Error { message } => assert!(message.contains("not configured")),
            other => panic!("expected error state, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_the_loop() {
        let loader = DashboardLoader::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryObjects::default()),
        );
        let poller = DashboardPoller::spawn(loader, WindowPreset::Today, Duration::from_secs(30));
        let mut rx = poller.subscribe();
        drop(poller);
        while rx.changed().await.is_ok() {}
    }
}
