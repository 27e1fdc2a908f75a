//! AWS S3 storage implementation.
//!
//! Every key maps to one object at `{bucket}/{prefix}/{key}` with `:`
//! replaced by `/`, mirroring the local layout.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::storage::KeyValueStore;

/// S3-backed key-value store.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 storage from environment configuration.
    pub async fn from_env() -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);

        let bucket =
            std::env::var("S3_BUCKET").unwrap_or_else(|_| "update-scanner".to_string());
        let prefix = std::env::var("S3_PREFIX").unwrap_or_else(|_| "pages".to_string());

        Ok(Self::new(client, bucket, prefix))
    }

    fn object_key(&self, key: &str) -> String {
        let path = key.replace(':', "/");
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            path
        } else {
            format!("{prefix}/{path}")
        }
    }
}

#[async_trait]
impl KeyValueStore for S3Storage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(e.to_string()))?
                    .into_bytes();
                String::from_utf8(bytes.to_vec())
                    .map(Some)
                    .map_err(|e| AppError::S3(format!("{object_key} is not valid UTF-8: {e}")))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::debug!("No object at s3://{}/{}", self.bucket, object_key);
                    Ok(None)
                } else {
                    Err(AppError::S3(service_err.to_string()))
                }
            }
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let object_key = self.object_key(key);
        let content_type = if key.starts_with("html:") {
            "text/html; charset=utf-8"
        } else {
            "application/json"
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(value.as_bytes().to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;

        log::debug!(
            "Wrote {} bytes to s3://{}/{}",
            value.len(),
            self.bucket,
            object_key
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let object_key = self.object_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;

        log::debug!("Deleted s3://{}/{}", self.bucket, object_key);
        Ok(())
    }
}
