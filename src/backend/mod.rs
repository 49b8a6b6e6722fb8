//! Object storage backend abstraction
//!
//! A backend is split into two pieces:
//!
//! - [`ObjectStore`]: a live client handle bound to one server and set of credentials.
//! - [`Connector`]: a factory that builds fresh handles. The connection holder calls it
//!   on every open and reopen.
//!
//! The production implementation lives in [`s3`] and wraps `aws-sdk-s3`. Tests plug in
//! their own implementations to inject failures and count reconnects.
//!
//! # Example
//!
//! ```no_run
//! use stowage::backend::{Connector, S3Connector};
//! use stowage::StorageConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StorageConfig::new("localhost:9000", "minioadmin", "minioadmin");
//!     let handle = S3Connector::new(config).connect().await?;
//!     println!("docs exists: {}", handle.bucket_exists("docs").await?);
//!     Ok(())
//! }
//! ```

pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::StoreResult;

pub use s3::{S3Connector, S3Handle};

/// Result of a successful object write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Object metadata returned by a stat probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<SystemTime>,
}

/// A live client handle to an object store
///
/// Implementations report failures as typed [`StoreError`](crate::StoreError)s and do not
/// retry; retry policy belongs to [`ResilientStore`](crate::ResilientStore).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    /// Create a bucket.
    ///
    /// Returns `false` when the bucket already existed (for example because a concurrent
    /// writer created it first).
    async fn make_bucket(&self, bucket: &str) -> StoreResult<bool>;

    /// Write an object
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StoreResult<PutReceipt>;

    /// Read a whole object
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;

    /// Delete an object
    async fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Probe object metadata. A missing object is `StoreError::NotFound`.
    async fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat>;

    /// Build a time-limited GET URL for an object
    async fn presigned_get(&self, bucket: &str, key: &str, expires: Duration)
        -> StoreResult<String>;

    /// Release the handle. Best-effort; the holder ignores failures.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Builds fresh [`ObjectStore`] handles
#[async_trait]
pub trait Connector: Send + Sync {
    /// Construct a new handle
    async fn connect(&self) -> StoreResult<Arc<dyn ObjectStore>>;

    /// Human-readable target, used in log events
    fn target(&self) -> &str;
}
