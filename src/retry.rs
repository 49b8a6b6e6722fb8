/*!
 * Retry-with-reconnect
 *
 * Each failed attempt is logged, the connection is reopened, and the loop sleeps a
 * fixed delay before trying again. Permanent errors stop the loop immediately without
 * touching the connection.
 */

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::backend::ObjectStore;
use crate::connection::ConnectionHolder;
use crate::error::{StoreError, StoreResult};

/// What a retrying call is doing, for log events and the exhaustion error
#[derive(Debug, Clone, Copy)]
pub struct OperationContext<'a> {
    pub operation: &'static str,
    pub bucket: &'a str,
    pub key: &'a str,
}

/// Run `operation` against the current handle up to `max_attempts` times.
///
/// The handle is fetched fresh for every attempt so that each retry sees the connection
/// created by the previous reopen. After the last failed attempt the connection is still
/// reopened and the delay still applied, so the next caller starts from a fresh handle.
pub async fn with_reconnect<F, Fut, T>(
    holder: &ConnectionHolder,
    ctx: OperationContext<'_>,
    max_attempts: u32,
    delay: Duration,
    mut operation: F,
) -> StoreResult<T>
where
    F: FnMut(Arc<dyn ObjectStore>) -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = match holder.current().await {
            Ok(handle) => operation(handle).await,
            Err(e) => Err(e),
        };

        let e = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !e.is_retryable() {
            warn!(
                operation = ctx.operation,
                bucket = %ctx.bucket,
                key = %ctx.key,
                error = %e,
                "Permanent failure, not retrying"
            );
            return Err(e);
        }

        error!(
            operation = ctx.operation,
            bucket = %ctx.bucket,
            key = %ctx.key,
            attempt,
            max_attempts,
            error = %e,
            "Fail {} {}/{}",
            ctx.operation,
            ctx.bucket,
            ctx.key
        );

        holder.reopen().await;
        sleep(delay).await;

        if attempt >= max_attempts {
            return Err(StoreError::RetriesExhausted {
                operation: ctx.operation,
                attempts: attempt,
                source: Box::new(e),
            });
        }
    }
}
