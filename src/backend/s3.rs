//! S3 backend built on `aws-sdk-s3`
//!
//! Works against AWS S3 and S3-compatible servers such as MinIO. Path-style addressing
//! is always on, and the SDK's own retry layer is disabled so that attempt bounds are
//! owned by [`ResilientStore`](crate::ResilientStore).

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as AwsS3Client;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

use super::{Connector, ObjectStat, ObjectStore, PutReceipt};
use crate::config::StorageConfig;
use crate::error::{StoreError, StoreResult};

/// Provider name attached to the static credentials
const CREDENTIALS_PROVIDER: &str = "stowage-static";

/// Builds [`S3Handle`]s from a [`StorageConfig`]
#[derive(Debug, Clone)]
pub struct S3Connector {
    config: StorageConfig,
}

impl S3Connector {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for S3Connector {
    async fn connect(&self) -> StoreResult<Arc<dyn ObjectStore>> {
        let handle = S3Handle::new(&self.config)?;
        Ok(Arc::new(handle))
    }

    fn target(&self) -> &str {
        &self.config.host
    }
}

/// A live S3 client handle
#[derive(Clone)]
pub struct S3Handle {
    client: AwsS3Client,
}

impl S3Handle {
    /// Build a client bound to the configured endpoint and credentials
    pub fn new(config: &StorageConfig) -> StoreResult<Self> {
        config.validate()?;

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(config.timeout())
            .build();

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .timeout_config(timeout_config)
            .retry_config(RetryConfig::disabled())
            .build();

        debug!(endpoint = %config.endpoint_url(), region = %config.region, "Built S3 client");

        Ok(Self {
            client: AwsS3Client::from_conf(s3_config),
        })
    }

}

impl From<AwsS3Client> for S3Handle {
    /// Wrap an already configured client
    fn from(client: AwsS3Client) -> Self {
        Self { client }
    }
}

fn missing_object(bucket: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3Handle {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    Ok(false)
                } else {
                    Err(StoreError::from(e))
                }
            }
        }
    }

    async fn make_bucket(&self, bucket: &str) -> StoreResult<bool> {
        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match e.as_service_error() {
                Some(se) if se.is_bucket_already_owned_by_you() => Ok(false),
                Some(se) if se.is_bucket_already_exists() => Err(StoreError::Service {
                    code: "BucketAlreadyExists".to_string(),
                    message: se.to_string(),
                }),
                _ => Err(StoreError::from(e)),
            },
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StoreResult<PutReceipt> {
        let response = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::from(e).for_object(bucket, key))?;

        Ok(PutReceipt {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: response.e_tag().map(|s| s.to_string()),
            version_id: response.version_id().map(|s| s.to_string()),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    missing_object(bucket, key)
                } else {
                    StoreError::from(e).for_object(bucket, key)
                }
            })?;

        let body = response.body.collect().await.map_err(|e| {
            StoreError::Network(format!("Failed to collect response body: {}", e))
        })?;

        Ok(body.into_bytes())
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::from(e).for_object(bucket, key))?;
        Ok(())
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    missing_object(bucket, key)
                } else {
                    StoreError::from(e).for_object(bucket, key)
                }
            })?;

        Ok(ObjectStat {
            size: response.content_length().unwrap_or(0).max(0) as u64,
            etag: response.e_tag().map(|s| s.to_string()),
            content_type: response.content_type().map(|s| s.to_string()),
            last_modified: response
                .last_modified()
                .and_then(|dt| SystemTime::try_from(*dt).ok()),
        })
    }

    async fn presigned_get(
        &self,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> StoreResult<String> {
        let presigning_config = PresigningConfig::expires_in(expires)
            .map_err(|e| StoreError::InvalidConfig(format!("Invalid presign duration: {}", e)))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StoreError::from(e).for_object(bucket, key))?;

        Ok(presigned.uri().to_string())
    }
}
