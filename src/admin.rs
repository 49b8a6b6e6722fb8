/*!
 * MinIO admin API client
 *
 * Only the bucket quota call is supported.
 */

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{error, info};

use crate::config::StorageConfig;
use crate::error::{StoreError, StoreResult};

/// Sets hard quotas on buckets
#[async_trait]
pub trait QuotaAdmin: Send + Sync {
    async fn set_bucket_quota(&self, bucket: &str, quota: &str) -> StoreResult<()>;
}

#[derive(Debug, Serialize)]
struct QuotaRequest<'a> {
    quota: HardQuota<'a>,
}

#[derive(Debug, Serialize)]
struct HardQuota<'a> {
    hard: &'a str,
}

/// HTTP client for `POST <endpoint>/set-bucket-quota?bucket=<name>`
#[derive(Debug, Clone)]
pub struct MinioAdmin {
    http: reqwest::Client,
    endpoint: String,
    access_key: String,
    secret_key: String,
}

impl MinioAdmin {
    /// Create an admin client for the server described by `config`
    pub fn new(config: &StorageConfig) -> StoreResult<Self> {
        Self::with_endpoint(
            config.admin_endpoint(),
            config.access_key.clone(),
            config.secret_key.clone(),
            config.timeout(),
        )
    }

    /// Create an admin client for an explicit base URL (must end with `/`)
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QuotaAdmin for MinioAdmin {
    async fn set_bucket_quota(&self, bucket: &str, quota: &str) -> StoreResult<()> {
        let url = format!("{}set-bucket-quota", self.endpoint);
        let body = QuotaRequest {
            quota: HardQuota { hard: quota },
        };

        let response = self
            .http
            .post(&url)
            .query(&[("bucket", bucket)])
            .basic_auth(&self.access_key, Some(&self.secret_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %bucket, error = %e, "Failed to send set-bucket-quota request");
                StoreError::from(e)
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            info!(bucket = %bucket, quota = %quota, "Bucket quota set");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        error!(bucket = %bucket, status = status.as_u16(), response = %text, "Failed to set quota");
        Err(StoreError::Admin {
            status: status.as_u16(),
            body: text,
        })
    }
}
