//! Durable artifact storage capability.

use async_trait::async_trait;
use uuid::Uuid;

use vforge_models::ArtifactRef;

use crate::client::R2Client;
use crate::error::{StorageError, StorageResult};
use crate::keys::{key_from_uri, object_key, public_uri};

/// Persists local artifacts and removes persisted ones.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Persist an ephemeral artifact under `folder`, returning its stable URI.
    async fn put(&self, local: &ArtifactRef, folder: &str) -> StorageResult<String>;

    /// Remove a previously persisted object.
    async fn delete(&self, uri: &str) -> StorageResult<()>;
}

#[async_trait]
impl DurableStore for R2Client {
    async fn put(&self, local: &ArtifactRef, folder: &str) -> StorageResult<String> {
        let path = local
            .local_path()
            .ok_or_else(|| StorageError::NotLocal(local.locator.clone()))?;

        let unique = Uuid::new_v4().simple().to_string();
        let key = object_key(folder, &unique[..12], &path)?;

        self.upload_file(&path, &key, local.kind.content_type()).await?;
        Ok(public_uri(self.public_url(), &key))
    }

    async fn delete(&self, uri: &str) -> StorageResult<()> {
        let key = key_from_uri(self.public_url(), uri)?;
        self.delete_object(&key).await
    }
}
