/*!
 * Connection holder
 *
 * Owns the single client handle of a store. Operations clone the current `Arc` under a
 * read lock and release it before doing I/O; open/reopen take the write lock, close the
 * old handle and install the new one.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::backend::{Connector, ObjectStore};
use crate::error::{StoreError, StoreResult};

pub struct ConnectionHolder {
    connector: Arc<dyn Connector>,
    handle: RwLock<Option<Arc<dyn ObjectStore>>>,
    generation: AtomicU64,
}

impl ConnectionHolder {
    /// Create a holder with no handle bound. Call [`open`](Self::open) to connect.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            handle: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// (Re)build the handle.
    ///
    /// An existing handle is closed first; close errors are ignored. Construction failure
    /// is logged and leaves the holder disconnected.
    pub async fn open(&self) {
        let mut slot = self.handle.write().await;

        if let Some(old) = slot.take() {
            if let Err(e) = old.close().await {
                debug!(target_host = %self.connector.target(), error = %e, "Ignoring close failure");
            }
        }

        match self.connector.connect().await {
            Ok(handle) => {
                *slot = Some(handle);
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                info!(target_host = %self.connector.target(), generation, "Connected to object store");
            }
            Err(e) => {
                error!(target_host = %self.connector.target(), error = %e, "Fail to connect");
            }
        }
    }

    /// Same as [`open`](Self::open); named for the retry path
    pub async fn reopen(&self) {
        self.open().await
    }

    /// Release the handle. Idempotent.
    pub async fn close(&self) {
        let old = self.handle.write().await.take();
        if let Some(old) = old {
            if let Err(e) = old.close().await {
                debug!(target_host = %self.connector.target(), error = %e, "Ignoring close failure");
            }
        }
    }

    /// The bound handle, or `Disconnected` when none is bound
    pub async fn current(&self) -> StoreResult<Arc<dyn ObjectStore>> {
        self.handle
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Disconnected(self.connector.target().to_string()))
    }

    pub async fn is_open(&self) -> bool {
        self.handle.read().await.is_some()
    }

    /// Number of successful opens so far; changes whenever the handle is replaced
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> &str {
        self.connector.target()
    }
}
