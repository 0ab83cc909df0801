use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::backend::{select_as, BackendError, DataStore, Direction, ObjectStore, RowQuery};
use crate::dashboard::compose::{compose_site_dashboard, EntityMetadata, SiteDashboard};
use crate::events::{EventLogReader, WindowPreset};
use crate::models::analytics::EventRecord;
use crate::models::content::{EntityKind, PostRow, ProfessionalRow, ServiceRow};

/// Fetches everything one dashboard snapshot needs and composes it.
#[derive(Clone)]
pub struct DashboardLoader {
    reader: EventLogReader,
    store: Arc<dyn DataStore>,
    objects: Arc<dyn ObjectStore>,
}

impl DashboardLoader {
    pub fn new(store: Arc<dyn DataStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            reader: EventLogReader::new(store.clone()),
            store,
            objects,
        }
    }

    /// The four fetches run concurrently; the first failure aborts the rest.
    pub async fn load(
        &self,
        preset: WindowPreset,
        now: DateTime<Utc>,
    ) -> Result<SiteDashboard, BackendError> {
        let window = preset.resolve(now);
        let (records, professionals, posts, services) = tokio::try_join!(
            self.reader.read(&window, None),
            self.professionals(),
            self.posts(),
            self.services(),
        )?;
        debug!(
            "Loaded {} records, {} professionals, {} posts, {} services for '{}'",
            records.len(),
            professionals.len(),
            posts.len(),
            services.len(),
            preset.label()
        );

        let entities = EntityMetadata {
            professionals,
            posts,
            services,
        };
        Ok(compose_site_dashboard(
            preset,
            &records,
            &entities,
            self.objects.as_ref(),
        ))
    }

    /// Every record since the all-time floor, for the overview totals.
    pub async fn all_records(&self, now: DateTime<Utc>) -> Result<Vec<EventRecord>, BackendError> {
        self.reader
            .read(&WindowPreset::AllTime.resolve(now), None)
            .await
    }

    pub async fn professionals(&self) -> Result<Vec<ProfessionalRow>, BackendError> {
        select_as(
            self.store.as_ref(),
            EntityKind::Professional.table(),
            &RowQuery::new().order_by("id", Direction::Asc),
        )
        .await
    }

    pub async fn posts(&self) -> Result<Vec<PostRow>, BackendError> {
        select_as(
            self.store.as_ref(),
            EntityKind::Post.table(),
            &RowQuery::new().order_by("created_at", Direction::Desc),
        )
        .await
    }

    pub async fn services(&self) -> Result<Vec<ServiceRow>, BackendError> {
        select_as(
            self.store.as_ref(),
            EntityKind::Service.table(),
            &RowQuery::new().order_by("id", Direction::Asc),
        )
        .await
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }
}
