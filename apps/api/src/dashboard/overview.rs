use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::aggregate::{
    count_by_day, count_by_foreign_id, count_by_kind, count_kinds, count_matching, join_entities,
};
use crate::analytics::chart::{ChartDataset, ChartKind};
use crate::backend::{BackendError, ObjectStore};
use crate::dashboard::compose::{entity_stats, EntityMetadata, EntityStats};
use crate::dashboard::loader::DashboardLoader;
use crate::models::analytics::{kinds, EventRecord};
use crate::models::content::EntityKind;
use crate::tracking::{AnalyticsSink, TrafficSummary};

/// All-time totals shown on the admin landing cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteTotals {
    pub whatsapp_clicks: u64,
    pub blog_views: u64,
    pub services_clicks: u64,
    pub professionals_clicks: u64,
    pub whatsapp_professionals: u64,
    pub total_views: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub totals: SiteTotals,
    pub blog: Vec<EntityStats>,
    pub professionals: Vec<EntityStats>,
    pub services: Vec<EntityStats>,
    pub charts: Vec<ChartDataset>,
    /// Absent when hosted analytics is not configured or did not answer.
    pub traffic: Option<TrafficSummary>,
}

pub fn site_totals(records: &[EventRecord]) -> SiteTotals {
    SiteTotals {
        whatsapp_clicks: count_matching(records, |r| r.kind.contains("whatsapp")),
        blog_views: count_kinds(records, &[kinds::BLOG_VIEW]),
        services_clicks: count_kinds(records, &[kinds::SERVICE_VIEW]),
        professionals_clicks: count_kinds(
            records,
            &[kinds::PROFESSIONAL_VIEW, kinds::PROFESSIONAL_CLICK],
        ),
        whatsapp_professionals: count_kinds(records, &[kinds::PROFESSIONAL_WHATSAPP]),
        total_views: count_matching(records, |r| r.kind.contains("view")),
    }
}

fn compose_overview(
    records: &[EventRecord],
    entities: &EntityMetadata,
    storage: &dyn ObjectStore,
    traffic: Option<TrafficSummary>,
) -> Overview {
    Overview {
        totals: site_totals(records),
        blog: entity_stats(EntityKind::Post, &entities.posts, records, storage),
        professionals: entity_stats(
            EntityKind::Professional,
            &entities.professionals,
            records,
            storage,
        ),
        services: entity_stats(EntityKind::Service, &entities.services, records, storage),
        charts: vec![
            ChartDataset::from_buckets(ChartKind::Bar, "Interações por tipo", &count_by_kind(records)),
            ChartDataset::from_buckets(ChartKind::Line, "Interações por dia", &count_by_day(records)),
            ChartDataset::from_entities(
                ChartKind::Bar,
                "Visualizações por post",
                &join_entities(
                    &entities.posts,
                    &count_by_foreign_id(records, EntityKind::Post.click_kinds()),
                ),
            ),
        ],
        traffic,
    }
}

/// Backend failures fail the overview; the traffic summary never does.
/// `traffic_days` only scopes the hosted summary; site totals are all-time.
pub async fn load_overview(
    loader: &DashboardLoader,
    analytics: &dyn AnalyticsSink,
    now: DateTime<Utc>,
    traffic_days: u32,
) -> Result<Overview, BackendError> {
    let (records, professionals, posts, services, traffic) = tokio::join!(
        loader.all_records(now),
        loader.professionals(),
        loader.posts(),
        loader.services(),
        analytics.summary(traffic_days),
    );
    let entities = EntityMetadata {
        professionals: professionals?,
        posts: posts?,
        services: services?,
    };
    Ok(compose_overview(&records?, &entities, loader.objects(), traffic))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::memory::{MemoryObjects, MemoryStore};
    use crate::models::analytics::ANALYTICS_TABLE;
    use crate::tracking::testing::RecordingAnalytics;
    use crate::tracking::DisabledAnalytics;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn rec(kind: &str) -> EventRecord {
        EventRecord {
            kind: kind.to_string(),
            foreign_id: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_totals_follow_type_rules() {
        let records: Vec<EventRecord> = [
            "whatsapp_footer",
            "whatsapp_flutuante",
            "profissional_whatsapp",
            "servico_whatsapp",
            "blog_view",
            "servico_view",
            "profissional_view",
            "profissional_click",
            "endereco",
        ]
        .into_iter()
        .map(rec)
        .collect();
        let t = site_totals(&records);
        assert_eq!(t.whatsapp_clicks, 4);
        assert_eq!(t.blog_views, 1);
        assert_eq!(t.services_clicks, 1);
        assert_eq!(t.professionals_clicks, 2);
        assert_eq!(t.whatsapp_professionals, 1);
        assert_eq!(t.total_views, 3);
    }

    #[tokio::test]
    async fn test_overview_survives_missing_traffic_summary() {
        let store = Arc::new(MemoryStore::new());
        let ts = (Utc::now() - Duration::days(900)).to_rfc3339();
        store.seed("blog_posts", vec![json!({"id": 7, "title": "Aromaterapia"})]);
        store.seed(
            ANALYTICS_TABLE,
            vec![json!({"id": 1, "tipo": "blog_view", "post_id": 7, "timestamp": ts})],
        );
        let loader = DashboardLoader::new(store, Arc::new(MemoryObjects::default()));

        let overview = load_overview(&loader, &DisabledAnalytics, Utc::now(), 30)
            .await
            .unwrap();
        assert!(overview.traffic.is_none());
        assert_eq!(overview.totals.blog_views, 1);
        assert_eq!(overview.blog[0].clicks, 1);
        assert_eq!(overview.charts[0].labels, vec!["blog_view"]);
        assert_eq!(overview.charts[2].labels, vec!["Aromaterapia"]);
        assert_eq!(overview.charts[2].values, vec![1]);

        let analytics = RecordingAnalytics {
            summary: Some(TrafficSummary {
                page_views: 10,
                ..Default::default()
            }),
            ..Default::default()
        };
        let overview = load_overview(&loader, &analytics, Utc::now(), 7).await.unwrap();
        assert_eq!(overview.traffic.map(|t| t.page_views), Some(10));
        assert_eq!(*analytics.summary_days.lock().unwrap(), vec![7]);
    }
}
