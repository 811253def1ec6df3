//! Artifact store client configuration and initialization.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Builder, Client};
use aws_types::region::Region;

use crate::error::{StorageError, StorageResult};

/// Configuration for the S3-compatible artifact store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
}

impl StorageConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let endpoint_url = std::env::var("STORAGE_ENDPOINT_URL")
            .map_err(|_| StorageError::config_error("STORAGE_ENDPOINT_URL not set"))?;
        let access_key_id = std::env::var("STORAGE_ACCESS_KEY_ID")
            .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?;
        let secret_access_key = std::env::var("STORAGE_SECRET_ACCESS_KEY")
            .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?;
        let bucket = std::env::var("STORAGE_BUCKET")
            .map_err(|_| StorageError::config_error("STORAGE_BUCKET not set"))?;
        let region = std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string());

        Ok(Self {
            endpoint_url,
            access_key_id,
            secret_access_key,
            bucket,
            region,
        })
    }
}

/// Client for the S3-compatible artifact store.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    /// Create a new store client from configuration.
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "adloom",
        );

        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    /// Bucket this client writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Access the underlying S3 client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// URI under which an uploaded key is addressable.
    pub fn object_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    /// Verify the store is reachable and the bucket exists.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::operation_failed(format!(
                    "bucket '{}' is not reachable: {e}",
                    self.bucket
                ))
            })?;
        Ok(())
    }
}
