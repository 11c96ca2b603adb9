//! Cloudflare R2 client (S3 API).

use std::path::Path;
use std::time::Instant;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use metrics::{counter, histogram};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Keys are unique per upload, so objects never change once written.
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[derive(Debug, Clone)]
pub struct R2Config {
    /// S3 API endpoint
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Usually "auto" for R2
    pub region: String,
    /// Public base URL objects are served from
    pub public_url: String,
}

fn required(var: &'static str) -> StorageResult<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(StorageError::MissingSetting(var))
}

impl R2Config {
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: required("R2_ENDPOINT_URL")?,
            access_key_id: required("R2_ACCESS_KEY_ID")?,
            secret_access_key: required("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_url: required("R2_PUBLIC_URL")?,
        })
    }
}

/// Bucket holding durable pipeline artifacts.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_url: String,
}

impl R2Client {
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_url: config.public_url,
        }
    }

    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Stream a local file to `key`.
    pub async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::LocalMissing(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        debug!(key = %key, bytes = size, "Uploading {}", path.display());

        let start = Instant::now();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(key, e))?;

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .cache_control(IMMUTABLE_CACHE_CONTROL)
            .send()
            .await;

        let status = if result.is_ok() { "ok" } else { "error" };
        counter!("storage_uploads_total", "status" => status).increment(1);
        result.map_err(|e| StorageError::upload_failed(key, e))?;

        histogram!("storage_upload_seconds").record(start.elapsed().as_secs_f64());
        counter!("storage_uploaded_bytes_total").increment(size);
        info!(key = %key, bytes = size, "Uploaded artifact");
        Ok(())
    }

    /// Delete `key`. Deleting a missing key succeeds.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(key, e))?;

        counter!("storage_deletes_total").increment(1);
        debug!(key = %key, "Deleted object");
        Ok(())
    }

    /// HEAD the bucket.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        Ok(())
    }
}
