use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::backend::ObjectStore;
use crate::errors::AppError;
use crate::models::content::EntityKind;

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    /// Path inside the kind's bucket; this is what rows store.
    pub path: String,
    pub public_url: String,
}

/// Stores an image under a fresh random name that keeps the original extension.
pub async fn upload_image(
    objects: &dyn ObjectStore,
    kind: EntityKind,
    file_name: &str,
    content_type: &str,
    body: Bytes,
) -> Result<UploadedImage, AppError> {
    if body.is_empty() {
        return Err(AppError::Validation("image file is empty".to_string()));
    }
    if body.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation(format!(
            "image exceeds {} bytes",
            MAX_IMAGE_BYTES
        )));
    }
    if !content_type.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "unsupported content type '{content_type}'"
        )));
    }

    let path = match extension(file_name) {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    };
    objects
        .upload(kind.bucket(), &path, body, content_type)
        .await?;
    info!("Uploaded image {}/{path}", kind.bucket());

    Ok(UploadedImage {
        public_url: objects.public_url(kind.bucket(), &path),
        path,
    })
}

fn extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
