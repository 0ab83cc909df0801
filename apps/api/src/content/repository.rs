use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{decode_row, select_as, DataStore, Direction, ObjectStore, RowQuery};
use crate::content::{ContentType, Validate};
use crate::errors::AppError;
use crate::models::analytics::ANALYTICS_TABLE;
use crate::models::content::{EntityKind, EntityMeta};

/// What a cascade delete removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub id: i64,
    pub analytics_rows_removed: usize,
    pub images_removed: usize,
    pub images_failed: usize,
}

fn default_order(kind: EntityKind) -> RowQuery {
    match kind {
        EntityKind::Post => RowQuery::new().order_by("created_at", Direction::Desc),
        _ => RowQuery::new().order_by("id", Direction::Asc),
    }
}

/// Every row, or only the ones the public site may show.
pub async fn list<C: ContentType>(
    store: &dyn DataStore,
    active_only: bool,
) -> Result<Vec<C::Row>, AppError> {
    let rows: Vec<C::Row> = select_as(store, C::KIND.table(), &default_order(C::KIND)).await?;
    Ok(rows
        .into_iter()
        .filter(|row| !active_only || row.is_active())
        .collect())
}

pub async fn create<C: ContentType>(
    store: &dyn DataStore,
    input: &C::Input,
) -> Result<C::Row, AppError> {
    input.validate().map_err(AppError::Validation)?;
    let row = serde_json::to_value(input).map_err(anyhow::Error::from)?;
    let stored = store.insert(C::KIND.table(), row).await?;
    let created: C::Row = decode_row(C::KIND.table(), stored)?;
    info!("Created {} {}", C::KIND.table(), created.id());
    Ok(created)
}

pub async fn update<C: ContentType>(
    store: &dyn DataStore,
    id: i64,
    input: &C::Input,
) -> Result<C::Row, AppError> {
    input.validate().map_err(AppError::Validation)?;
    let patch = serde_json::to_value(input).map_err(anyhow::Error::from)?;
    let updated = store
        .update(C::KIND.table(), &RowQuery::new().eq("id", id), patch)
        .await?;
    let row = updated
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", C::KIND.table())))?;
    info!("Updated {} {id}", C::KIND.table());
    Ok(decode_row(C::KIND.table(), row)?)
}

/// Stored image references on a raw row, whichever column the kind uses.
fn image_refs(kind: EntityKind, row: &Value) -> Vec<String> {
    let column = match kind {
        EntityKind::Professional => "imagens",
        EntityKind::Post => "image_url",
        EntityKind::Service => "imagem",
    };
    match row.get(column) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Deletes an entity and everything that references it.
///
/// Order: analytics rows by the entity's foreign column, then stored images
/// (best-effort; failures are only logged), then the row itself. Steps are
/// not transactional: a failure stops the cascade and earlier steps stay done.
pub async fn delete_cascade(
    store: &dyn DataStore,
    objects: &dyn ObjectStore,
    kind: EntityKind,
    id: i64,
) -> Result<DeletionReport, AppError> {
    let by_id = RowQuery::new().eq("id", id);
    let row = store
        .select(kind.table(), &by_id.clone().limit(1))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", kind.table())))?;

    let analytics = store
        .delete(
            ANALYTICS_TABLE,
            &RowQuery::new().eq(kind.analytics_column(), id),
        )
        .await?;

    let mut report = DeletionReport {
        id,
        analytics_rows_removed: analytics.len(),
        images_removed: 0,
        images_failed: 0,
    };

    // Absolute URLs point outside our buckets and are left alone.
    for path in image_refs(kind, &row)
        .iter()
        .filter(|p| !p.starts_with("http"))
    {
        match objects.remove(kind.bucket(), path).await {
            Ok(()) => report.images_removed += 1,
            Err(e) => {
                warn!("Could not remove image {}/{path}: {e}", kind.bucket());
                report.images_failed += 1;
            }
        }
    }

    store.delete(kind.table(), &by_id).await?;
    info!(
        "Deleted {} {id} ({} analytics rows, {} images)",
        kind.table(),
        report.analytics_rows_removed,
        report.images_removed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::backend::memory::{MemoryObjects, MemoryStore};
    use crate::content::{Posts, Professionals};
    use crate::dashboard::DashboardLoader;
    use crate::events::WindowPreset;
    use crate::models::content::{PostInput, ProfessionalInput};

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let ts = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        store.seed(
            "profissionais",
            vec![
                json!({"id": 5, "nome": "Carla", "imagens": ["carla.jpg", "https://cdn.example.com/c.jpg"]}),
                json!({"id": 6, "nome": "Davi", "ativo": false}),
            ],
        );
        store.seed(
            ANALYTICS_TABLE,
            vec![
                json!({"id": 1, "tipo": "profissional_click", "profissional_id": 5, "timestamp": ts}),
                json!({"id": 2, "tipo": "profissional_whatsapp", "profissional_id": 5, "timestamp": ts}),
                json!({"id": 3, "tipo": "profissional_click", "profissional_id": 6, "timestamp": ts}),
                json!({"id": 4, "tipo": "whatsapp_footer", "timestamp": ts}),
            ],
        );
        store
    }

    #[tokio::test]
    async fn test_delete_professional_cascades() {
        let store = Arc::new(seeded());
        let objects = Arc::new(MemoryObjects::default());
        objects.put("profissionais", "carla.jpg");

        let report = delete_cascade(store.as_ref(), objects.as_ref(), EntityKind::Professional, 5)
            .await
            .unwrap();
        assert_eq!(report.analytics_rows_removed, 2);
        assert_eq!(report.images_removed, 1);
        assert!(!objects.contains("profissionais", "carla.jpg"));

        let remaining = store.rows(ANALYTICS_TABLE);
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|r| r["profissional_id"] != 5));
        assert_eq!(store.rows("profissionais").len(), 1);

        let dashboard = DashboardLoader::new(store, objects)
            .load(WindowPreset::AllTime, Utc::now())
            .await
            .unwrap();
        assert!(dashboard.professionals.iter().all(|p| p.id != 5));
    }

    #[tokio::test]
    async fn test_image_failure_does_not_block_delete() {
        let store = seeded();
        let objects = MemoryObjects::default();
        objects.fail_removals();
        let report = delete_cascade(&store, &objects, EntityKind::Professional, 5)
            .await
            .unwrap();
        assert_eq!(report.images_failed, 1);
        assert!(store.rows("profissionais").iter().all(|r| r["id"] != 5));
    }

    #[tokio::test]
    async fn test_analytics_failure_stops_cascade() {
        let store = seeded();
        store.fail_table(ANALYTICS_TABLE);
        let err = delete_cascade(&store, &MemoryObjects::default(), EntityKind::Professional, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
        assert_eq!(store.rows("profissionais").len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = seeded();
        let err = delete_cascade(&store, &MemoryObjects::default(), EntityKind::Service, 42)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_backend() {
        let store = MemoryStore::new();
        store.fail_table("blog_posts");
        let input = PostInput {
            title: String::new(),
            content: "texto".into(),
            image_url: None,
        };
        let err = create::<Posts>(&store, &input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_update_and_public_listing() {
        let store = seeded();
        let created = create::<Professionals>(
            &store,
            &ProfessionalInput {
                nome: "Eva".into(),
                especialidades: vec!["Reflexologia".into()],
                descricao: None,
                imagens: vec![],
                ativo: Some(true),
            },
        )
        .await
        .unwrap();
        assert!(created.id > 1000);

        let updated = update::<Professionals>(
            &store,
            created.id,
            &ProfessionalInput {
                nome: "Eva Lima".into(),
                especialidades: vec![],
                descricao: None,
                imagens: vec![],
                ativo: Some(true),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.nome, "Eva Lima");

        let public = list::<Professionals>(&store, true).await.unwrap();
        let names: Vec<&str> = public.iter().map(|p| p.nome.as_str()).collect();
        assert_eq!(names, vec!["Carla", "Eva Lima"]);
        assert_eq!(list::<Professionals>(&store, false).await.unwrap().len(), 3);
    }
}
