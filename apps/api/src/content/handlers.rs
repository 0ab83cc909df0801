//! Axum route handlers for content administration, generic over `ContentType`.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::analytics::aggregate::count_kinds;
use crate::content::images::{upload_image, UploadedImage};
use crate::content::repository::{self, DeletionReport};
use crate::content::ContentType;
use crate::errors::AppError;
use crate::events::EventLogReader;
use crate::models::analytics::EventRecord;
use crate::state::AppState;

const RECENT_INTERACTIONS: usize = 20;

#[derive(Deserialize)]
pub struct InteractionsQuery {
    pub limit: Option<usize>,
}

/// All-time interaction counts for one entity plus its latest records.
#[derive(Debug, Serialize)]
pub struct EntityInteractions {
    pub id: i64,
    pub clicks: u64,
    pub whatsapp_clicks: u64,
    pub recent: Vec<EventRecord>,
}

/// GET /api/v1/public/{kind}
pub async fn handle_public_list<C: ContentType>(
    State(state): State<AppState>,
) -> Result<Json<Vec<C::Row>>, AppError> {
    Ok(Json(repository::list::<C>(state.store.as_ref(), true).await?))
}

/// GET /api/v1/admin/{kind}
pub async fn handle_admin_list<C: ContentType>(
    State(state): State<AppState>,
) -> Result<Json<Vec<C::Row>>, AppError> {
    Ok(Json(repository::list::<C>(state.store.as_ref(), false).await?))
}

/// POST /api/v1/admin/{kind}
pub async fn handle_create<C: ContentType>(
    State(state): State<AppState>,
    Json(input): Json<C::Input>,
) -> Result<(StatusCode, Json<C::Row>), AppError> {
    let row = repository::create::<C>(state.store.as_ref(), &input).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// PUT /api/v1/admin/{kind}/:id
pub async fn handle_update<C: ContentType>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<C::Input>,
) -> Result<Json<C::Row>, AppError> {
    Ok(Json(
        repository::update::<C>(state.store.as_ref(), id, &input).await?,
    ))
}

/// DELETE /api/v1/admin/{kind}/:id
pub async fn handle_delete<C: ContentType>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeletionReport>, AppError> {
    let report =
        repository::delete_cascade(state.store.as_ref(), state.objects.as_ref(), C::KIND, id)
            .await?;
    Ok(Json(report))
}

/// GET /api/v1/admin/{kind}/:id/interactions?limit=N
pub async fn handle_interactions<C: ContentType>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<InteractionsQuery>,
) -> Result<Json<EntityInteractions>, AppError> {
    let mut records = EventLogReader::new(state.store.clone())
        .for_entity(C::KIND, id)
        .await?;
    let clicks = count_kinds(&records, C::KIND.click_kinds());
    let whatsapp_clicks = count_kinds(&records, C::KIND.whatsapp_kinds());
    records.truncate(params.limit.unwrap_or(RECENT_INTERACTIONS));
    Ok(Json(EntityInteractions {
        id,
        clicks,
        whatsapp_clicks,
        recent: records,
    }))
}

/// POST /api/v1/admin/{kind}/images
/// Expects one multipart field named `file`.
pub async fn handle_upload_image<C: ContentType>(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadedImage>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("could not read upload: {e}")))?;

        let image =
            upload_image(state.objects.as_ref(), C::KIND, &file_name, &content_type, body).await?;
        return Ok((StatusCode::CREATED, Json(image)));
    }
    Err(AppError::Validation("multipart field 'file' is required".to_string()))
}
