use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;

use super::{BackendError, Unconfigured};
use crate::config::{BackendSettings, StorageSettings};

/// Object storage for entity images, one bucket per entity kind.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError>;

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), BackendError>;

    /// Public URL for a stored object. References that are already URLs pass through.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Public URL scheme shared by every store: `{base}/storage/v1/object/public/{bucket}/{path}`.
pub fn public_object_url(base_url: &str, bucket: &str, path: &str) -> String {
    if path.starts_with("http") {
        return path.to_string();
    }
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        path.trim_start_matches('/')
    )
}

/// Storage reached through the backend's S3-compatible endpoint.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    base_url: String,
}

impl S3ObjectStore {
    pub async fn connect(backend: &BackendSettings, storage: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            &storage.access_key_id,
            &storage.secret_access_key,
            None,
            None,
            "nirvana-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(format!("{}/storage/v1/s3", backend.base_url))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            base_url: backend.base_url.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(path)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| BackendError::Storage(format!("upload of {bucket}/{path} failed: {e}")))?;
        info!("Uploaded object {bucket}/{path}");
        Ok(())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), BackendError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| BackendError::Storage(format!("removal of {bucket}/{path} failed: {e}")))?;
        info!("Removed object {bucket}/{path}");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        public_object_url(&self.base_url, bucket, path)
    }
}

#[async_trait]
impl ObjectStore for Unconfigured {
    async fn upload(
        &self,
        _bucket: &str,
        _path: &str,
        _body: Bytes,
        _content_type: &str,
    ) -> Result<(), BackendError> {
        Err(self.err())
    }

    async fn remove(&self, _bucket: &str, _path: &str) -> Result<(), BackendError> {
        Err(self.err())
    }

    fn public_url(&self, _bucket: &str, path: &str) -> String {
        path.to_string()
    }
}
