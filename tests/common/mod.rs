//! Shared fixtures: an in-memory object store with fault injection, a connector that
//! counts reconnects, and an admin client that records quota calls.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stowage::{
    Connector, ObjectStat, ObjectStore, PutReceipt, QuotaAdmin, ResilientStore, RetryPolicy,
    StoreError, StoreResult,
};

pub const BUCKET_EXISTS: &str = "bucket_exists";
pub const MAKE_BUCKET: &str = "make_bucket";
pub const PUT_OBJECT: &str = "put_object";
pub const GET_OBJECT: &str = "get_object";
pub const REMOVE_OBJECT: &str = "remove_object";
pub const STAT_OBJECT: &str = "stat_object";
pub const PRESIGNED_GET: &str = "presigned_get";

/// Server-side state shared by every handle a connector hands out
#[derive(Default)]
pub struct Backend {
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<(String, String), Bytes>>,
    faults: Mutex<HashMap<&'static str, (u32, StoreError)>>,
    calls: Mutex<HashMap<&'static str, u32>>,
    connects: AtomicU32,
    closes: AtomicU32,
    failing_connects: AtomicU32,
    next_handle_id: AtomicU64,
    /// Make `bucket_exists` always answer false, as if another writer raced us
    pub stale_bucket_exists: AtomicBool,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `times` calls of `op` with a transient network error
    pub fn fail(&self, op: &'static str, times: u32) {
        self.fail_with(op, times, StoreError::Network("injected connection reset".to_string()));
    }

    /// Fail the next `times` calls of `op` with `error`
    pub fn fail_with(&self, op: &'static str, times: u32, error: StoreError) {
        self.faults.lock().unwrap().insert(op, (times, error));
    }

    /// Fail the next `times` connection attempts
    pub fn fail_connects(&self, times: u32) {
        self.failing_connects.store(times, Ordering::SeqCst);
    }

    pub fn calls(&self, op: &'static str) -> u32 {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.lock().unwrap().contains(bucket)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn insert(&self, bucket: &str, key: &str, data: &'static [u8]) {
        self.buckets.lock().unwrap().insert(bucket.to_string());
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), Bytes::from_static(data));
    }

    fn record(&self, op: &'static str) -> StoreResult<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;

        let mut faults = self.faults.lock().unwrap();
        if let Some((remaining, error)) = faults.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

pub struct MemoryHandle {
    backend: Arc<Backend>,
    pub id: u64,
}

#[async_trait]
impl ObjectStore for MemoryHandle {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        self.backend.record(BUCKET_EXISTS)?;
        if self.backend.stale_bucket_exists.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self.backend.has_bucket(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> StoreResult<bool> {
        self.backend.record(MAKE_BUCKET)?;
        Ok(self.backend.buckets.lock().unwrap().insert(bucket.to_string()))
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StoreResult<PutReceipt> {
        self.backend.record(PUT_OBJECT)?;
        if !self.backend.has_bucket(bucket) {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        let etag = format!("\"{:x}-{}\"", data.len(), self.id);
        self.backend
            .objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data);

        Ok(PutReceipt {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: Some(etag),
            version_id: None,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        self.backend.record(GET_OBJECT)?;
        self.backend
            .object(bucket, key)
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.backend.record(REMOVE_OBJECT)?;
        self.backend
            .objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat> {
        self.backend.record(STAT_OBJECT)?;
        let data = self
            .backend
            .object(bucket, key)
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        Ok(ObjectStat {
            size: data.len() as u64,
            etag: None,
            content_type: Some("application/octet-stream".to_string()),
            last_modified: None,
        })
    }

    async fn presigned_get(
        &self,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> StoreResult<String> {
        self.backend.record(PRESIGNED_GET)?;
        Ok(format!(
            "http://memory/{}/{}?X-Amz-Expires={}&handle={}",
            bucket,
            key,
            expires.as_secs(),
            self.id
        ))
    }

    async fn close(&self) -> StoreResult<()> {
        self.backend.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MemoryConnector {
    pub backend: Arc<Backend>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> StoreResult<Arc<dyn ObjectStore>> {
        self.backend.connects.fetch_add(1, Ordering::SeqCst);

        let failing = &self.backend.failing_connects;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Network("connection refused".to_string()));
        }

        let id = self.backend.next_handle_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(MemoryHandle {
            backend: self.backend.clone(),
            id,
        }))
    }

    fn target(&self) -> &str {
        "memory:9000"
    }
}

/// Records quota calls; optionally answers every call with HTTP 403
#[derive(Default)]
pub struct RecordingAdmin {
    pub calls: Mutex<Vec<(String, String)>>,
    pub reject: bool,
}

impl RecordingAdmin {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuotaAdmin for RecordingAdmin {
    async fn set_bucket_quota(&self, bucket: &str, quota: &str) -> StoreResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), quota.to_string()));
        if self.reject {
            Err(StoreError::Admin {
                status: 403,
                body: "Access Denied.".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Default attempt bounds without the one-second sleep
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::default().without_delay()
}

/// An opened store over a fresh in-memory backend
pub async fn open_store() -> (ResilientStore, Arc<Backend>, Arc<RecordingAdmin>) {
    stowage::logging::init_test_logging();

    let backend = Backend::new();
    let admin = Arc::new(RecordingAdmin::default());
    let store = ResilientStore::builder(Arc::new(MemoryConnector {
        backend: backend.clone(),
    }))
    .admin(admin.clone())
    .policy(fast_policy())
    .open()
    .await;

    (store, backend, admin)
}
