//! CDN client implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::location::ObjectLocation;

/// Object storage operations used by transcode tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Temporary signed URL for reading an object.
    async fn presign_get(&self, location: &ObjectLocation, expires_in: Duration)
        -> StorageResult<String>;

    /// Upload a local file.
    async fn upload_file(&self, path: &Path, location: &ObjectLocation) -> StorageResult<()>;
}

/// Configuration for the CDN client.
#[derive(Debug, Clone)]
pub struct CdnConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region (most S3-compatible stores accept anything)
    pub region: String,
}

impl CdnConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("VT_CDN_ENDPOINT")
                .map_err(|_| StorageError::config_error("VT_CDN_ENDPOINT not set"))?,
            access_key_id: std::env::var("VT_CDN_ACCESSKEYID")
                .map_err(|_| StorageError::config_error("VT_CDN_ACCESSKEYID not set"))?,
            secret_access_key: std::env::var("VT_CDN_SECRETACCESSKEY")
                .map_err(|_| StorageError::config_error("VT_CDN_SECRETACCESSKEY not set"))?,
            region: std::env::var("VT_CDN_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        })
    }
}

/// S3-compatible CDN client.
#[derive(Clone)]
pub struct CdnClient {
    client: Client,
}

impl CdnClient {
    /// Create a new client from configuration.
    pub fn new(config: CdnConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vt-cdn",
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
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(CdnConfig::from_env()?))
    }
}

#[async_trait]
impl ObjectStore for CdnClient {
    async fn presign_get(
        &self,
        location: &ObjectLocation,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::presign_failed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::presign_failed(e.to_string()))?;

        debug!("Presigned {} for {:?}", location, expires_in);
        Ok(presigned.uri().to_string())
    }

    async fn upload_file(&self, path: &Path, location: &ObjectLocation) -> StorageResult<()> {
        debug!("Uploading {} to {}", path.display(), location);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), location);
        Ok(())
    }
}
