/*!
 * Stowage - resilient adapter for S3-compatible object storage
 *
 * Wraps an S3 client (MinIO in practice) with:
 * - Bucket auto-creation before writes
 * - Hard quota registration for created buckets via the MinIO admin API
 * - Retry-with-reconnect on transient failures
 * - Presigned download URLs
 */

pub mod admin;
pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod retry;
pub mod store;

// Re-export commonly used types
pub use admin::{MinioAdmin, QuotaAdmin};
pub use backend::{Connector, ObjectStat, ObjectStore, PutReceipt};
pub use config::{RetryPolicy, StorageConfig};
pub use connection::ConnectionHolder;
pub use error::{StoreError, StoreResult};
pub use store::{ResilientStore, ResilientStoreBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
