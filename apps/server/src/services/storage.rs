//! S3 storage service for job photos.
//!
//! Supports both AWS S3 and MinIO for development.

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use secrecy::ExposeSecret;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::error::{AppError, AppResult};

/// Photo file extensions accepted on upload.
pub const PHOTO_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "heic"];

/// S3 storage client wrapper.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    /// Create a new S3 storage client and make sure the bucket exists.
    pub async fn new(config: &StorageSettings) -> AppResult<Self> {
        let storage = Self::build(config);

        storage.ensure_bucket_exists().await?;

        info!("S3 storage initialized: bucket={}", config.bucket);

        Ok(storage)
    }

    /// Build the client without touching the network.
    pub fn build(config: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            config.secret_key.expose_secret(),
            None,
            None,
            "acs",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true); // Required for MinIO

        if let Some(ref endpoint) = config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    /// Ensure the bucket exists, creating it if necessary.
    async fn ensure_bucket_exists(&self) -> AppResult<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    info!("Creating S3 bucket '{}'", self.bucket);
                    self.client
                        .create_bucket()
                        .bucket(&self.bucket)
                        .send()
                        .await
                        .map_err(|e| {
                            AppError::Storage(format!("Failed to create bucket: {}", e))
                        })?;
                    Ok(())
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to access bucket '{}': {}",
                        self.bucket, service_error
                    )))
                }
            }
        }
    }

    /// Check the bucket answers with the configured credentials.
    pub async fn ping(&self) -> AppResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                AppError::Storage(format!(
                    "Bucket '{}' unreachable: {}",
                    self.bucket,
                    e.into_service_error()
                ))
            })
    }

    /// Content type for an accepted photo extension, `None` when the extension is not allowed.
    pub fn photo_content_type(ext: &str) -> Option<&'static str> {
        match ext.to_lowercase().as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "webp" => Some("image/webp"),
            "heic" => Some("image/heic"),
            _ => None,
        }
    }

    /// Upload an object.
    pub async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> AppResult<()> {
        let body = aws_sdk_s3::primitives::ByteStream::from(data);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload file to S3: {}", e)))?;

        Ok(())
    }

    /// Fetch an object and its content type.
    pub async fn get(&self, key: &str) -> AppResult<(Vec<u8>, Option<String>)> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    AppError::NotFound(format!("File {}", key))
                } else {
                    AppError::Storage(format!("Failed to get file from S3: {}", service_error))
                }
            })?;

        let content_type = response.content_type().map(String::from);
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read S3 response body: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok((data, content_type))
    }

    /// Delete an object. Deleting a missing key succeeds.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete file from S3: {}", e)))?;

        Ok(())
    }

    /// Delete several objects, logging failures instead of returning them.
    pub async fn delete_best_effort(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                tracing::warn!(key = %key, "Failed to remove stored photo: {}", e);
            }
        }
    }

    /// S3 key for a job photo: work-orders/{work_order_id}/jobs/{job_item_id}/{photo_id}.{ext}
    pub fn photo_key(work_order_id: Uuid, job_item_id: Uuid, photo_id: Uuid, ext: &str) -> String {
        format!(
            "work-orders/{}/jobs/{}/{}.{}",
            work_order_id,
            job_item_id,
            photo_id,
            ext.to_lowercase()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_key() {
        let wo = Uuid::nil();
        let key = Storage::photo_key(wo, wo, wo, "JPG");
        assert_eq!(
            key,
            "work-orders/00000000-0000-0000-0000-000000000000/jobs/00000000-0000-0000-0000-000000000000/00000000-0000-0000-0000-000000000000.jpg"
        );
    }

    #[test]
    fn test_photo_content_type() {
        assert_eq!(Storage::photo_content_type("PNG"), Some("image/png"));
        assert_eq!(Storage::photo_content_type("jpeg"), Some("image/jpeg"));
        assert_eq!(Storage::photo_content_type("heic"), Some("image/heic"));
        assert_eq!(Storage::photo_content_type("gif"), None);
        for ext in PHOTO_EXTENSIONS {
            assert!(Storage::photo_content_type(ext).is_some());
        }
    }
}
