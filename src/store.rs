/*!
 * Resilient object store
 *
 * Wraps a [`ConnectionHolder`] with the per-operation retry policy:
 *
 * | Operation | Attempts | On transient failure |
 * |-----------|----------|----------------------|
 * | `health`  | 1        | log                  |
 * | `put`     | 3        | log, reopen, sleep   |
 * | `get`     | 1        | log, reopen, sleep   |
 * | `remove`  | 1        | log                  |
 * | `exists`  | 1        | log                  |
 * | `stat`    | 1        | log                  |
 * | `presign` | 10       | log, reopen, sleep   |
 *
 * Writes create missing buckets and register a hard quota for each bucket created.
 */

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::admin::{MinioAdmin, QuotaAdmin};
use crate::backend::{Connector, ObjectStat, ObjectStore, PutReceipt, S3Connector};
use crate::config::{
    validate_bucket_name, RetryPolicy, StorageConfig, DEFAULT_BUCKET_QUOTA, HEALTH_BUCKET,
    HEALTH_KEY, HEALTH_PAYLOAD,
};
use crate::connection::ConnectionHolder;
use crate::error::{StoreError, StoreResult};
use crate::retry::{with_reconnect, OperationContext};

/// Object store client with bucket auto-creation, quotas and reconnecting retries
///
/// # Example
///
/// ```no_run
/// use stowage::{ResilientStore, StorageConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = StorageConfig::from_env()?;
///     let store = ResilientStore::connect(config).await?;
///
///     store.put("docs", "a.txt", b"hello".to_vec()).await?;
///     let url = store.presign("docs", "a.txt", Duration::from_secs(3600)).await?;
///     println!("{}", url);
///     Ok(())
/// }
/// ```
pub struct ResilientStore {
    connection: ConnectionHolder,
    admin: Option<Arc<dyn QuotaAdmin>>,
    policy: RetryPolicy,
    bucket_quota: String,
}

/// Builder for [`ResilientStore`]
pub struct ResilientStoreBuilder {
    connector: Arc<dyn Connector>,
    admin: Option<Arc<dyn QuotaAdmin>>,
    policy: RetryPolicy,
    bucket_quota: String,
}

impl ResilientStoreBuilder {
    /// Admin client used to set quotas on created buckets
    pub fn admin(mut self, admin: Arc<dyn QuotaAdmin>) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Quota registered for created buckets (e.g. "1GB")
    pub fn bucket_quota(mut self, quota: impl Into<String>) -> Self {
        self.bucket_quota = quota.into();
        self
    }

    /// Build the store without connecting
    pub fn build(self) -> ResilientStore {
        ResilientStore {
            connection: ConnectionHolder::new(self.connector),
            admin: self.admin,
            policy: self.policy,
            bucket_quota: self.bucket_quota,
        }
    }

    /// Build the store and open its connection. A failed open is logged, not returned.
    pub async fn open(self) -> ResilientStore {
        let store = self.build();
        store.connection.open().await;
        store
    }
}

impl ResilientStore {
    pub fn builder(connector: Arc<dyn Connector>) -> ResilientStoreBuilder {
        ResilientStoreBuilder {
            connector,
            admin: None,
            policy: RetryPolicy::default(),
            bucket_quota: DEFAULT_BUCKET_QUOTA.to_string(),
        }
    }

    /// Connect to the S3 endpoint and admin API described by `config`.
    ///
    /// Only an invalid configuration is an error; an unreachable server leaves the store
    /// disconnected and the first operation retries the connection.
    pub async fn connect(config: StorageConfig) -> StoreResult<Self> {
        config.validate()?;
        let admin = MinioAdmin::new(&config)?;
        let policy = config.retry.clone();
        let quota = config.bucket_quota.clone();

        Ok(Self::builder(Arc::new(S3Connector::new(config)))
            .admin(Arc::new(admin))
            .policy(policy)
            .bucket_quota(quota)
            .open()
            .await)
    }

    pub fn connection(&self) -> &ConnectionHolder {
        &self.connection
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Drop the connection. The next retrying operation reconnects.
    pub async fn close(&self) {
        self.connection.close().await
    }

    /// Write a small probe object into the health bucket. Single attempt.
    pub async fn health(&self) -> StoreResult<PutReceipt> {
        let result: StoreResult<PutReceipt> = async {
            let handle = self.connection.current().await?;
            self.ensure_bucket(handle.as_ref(), HEALTH_BUCKET).await?;
            handle
                .put_object(HEALTH_BUCKET, HEALTH_KEY, Bytes::from_static(HEALTH_PAYLOAD))
                .await
        }
        .await;

        if let Err(e) = &result {
            error!(bucket = HEALTH_BUCKET, key = HEALTH_KEY, error = %e, "Health check failed");
        }
        result
    }

    /// Write `data` under `bucket/key`, creating the bucket if needed
    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
    ) -> StoreResult<PutReceipt> {
        validate_target(bucket, key)?;

        let data: Bytes = data.into();
        let data = &data;
        let ctx = OperationContext {
            operation: "put",
            bucket,
            key,
        };

        with_reconnect(
            &self.connection,
            ctx,
            self.policy.put_attempts,
            self.policy.delay(),
            |handle| async move {
                self.ensure_bucket(handle.as_ref(), bucket).await?;
                handle.put_object(bucket, key, data.clone()).await
            },
        )
        .await
    }

    /// Read a whole object
    pub async fn get(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        validate_target(bucket, key)?;
        let ctx = OperationContext {
            operation: "get",
            bucket,
            key,
        };

        with_reconnect(
            &self.connection,
            ctx,
            self.policy.get_attempts,
            self.policy.delay(),
            |handle| async move { handle.get_object(bucket, key).await },
        )
        .await
    }

    /// Delete an object. Single attempt, no reconnect.
    pub async fn remove(&self, bucket: &str, key: &str) -> StoreResult<()> {
        validate_target(bucket, key)?;
        let result: StoreResult<()> = async {
            self.connection
                .current()
                .await?
                .remove_object(bucket, key)
                .await
        }
        .await;

        if let Err(e) = &result {
            error!(bucket = %bucket, key = %key, error = %e, "Fail rm {}/{}", bucket, key);
        }
        result
    }

    /// Whether an object exists.
    ///
    /// `Ok(false)` means the server reported it missing; a failed probe is an error.
    pub async fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        match self.probe(bucket, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => {
                error!(bucket = %bucket, key = %key, error = %e, "Fail exists {}/{}", bucket, key);
                Err(e)
            }
        }
    }

    /// Object metadata. Single attempt, no reconnect.
    pub async fn stat(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat> {
        let result = self.probe(bucket, key).await;
        if let Err(e) = &result {
            if e.is_not_found() {
                debug!(bucket = %bucket, key = %key, "Object not found");
            } else {
                error!(bucket = %bucket, key = %key, error = %e, "Fail stat {}/{}", bucket, key);
            }
        }
        result
    }

    /// Time-limited direct-download URL for an object
    pub async fn presign(&self, bucket: &str, key: &str, ttl: Duration) -> StoreResult<String> {
        validate_target(bucket, key)?;
        let ctx = OperationContext {
            operation: "presign",
            bucket,
            key,
        };

        with_reconnect(
            &self.connection,
            ctx,
            self.policy.presign_attempts,
            self.policy.delay(),
            |handle| async move { handle.presigned_get(bucket, key, ttl).await },
        )
        .await
    }

    async fn probe(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat> {
        validate_target(bucket, key)?;
        self.connection
            .current()
            .await?
            .stat_object(bucket, key)
            .await
    }

    /// Create `bucket` if absent and register its quota when this call created it
    async fn ensure_bucket(&self, handle: &dyn ObjectStore, bucket: &str) -> StoreResult<()> {
        if handle.bucket_exists(bucket).await? {
            return Ok(());
        }

        if handle.make_bucket(bucket).await? {
            info!(bucket = %bucket, "Created bucket");
            self.apply_quota(bucket).await;
        } else {
            debug!(bucket = %bucket, "Bucket created concurrently");
        }
        Ok(())
    }

    async fn apply_quota(&self, bucket: &str) {
        let Some(admin) = &self.admin else {
            return;
        };

        if let Err(e) = admin.set_bucket_quota(bucket, &self.bucket_quota).await {
            debug!(bucket = %bucket, error = %e, "Continuing without bucket quota");
        }
    }
}

/// Reject names the server would refuse before any request goes out
fn validate_target(bucket: &str, key: &str) -> StoreResult<()> {
    validate_bucket_name(bucket)?;
    if key.is_empty() {
        return Err(StoreError::InvalidKey("object key cannot be empty".to_string()));
    }
    Ok(())
}
