/*!
 * Error types for stowage
 */

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Result type alias for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while talking to the object store or its admin API
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Object not found in bucket
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Bucket does not exist
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Access denied by the storage service
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// No connection handle is bound
    #[error("Not connected to {0}")]
    Disconnected(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Storage service error with its error code
    #[error("Storage service error ({code}): {message}")]
    Service { code: String, message: String },

    /// Unclassified SDK error
    #[error("SDK error: {0}")]
    Sdk(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid bucket name
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    /// Invalid object key
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Admin API answered with a non-success status
    #[error("Admin API error (HTTP {status}): {body}")]
    Admin { status: u16, body: String },

    /// Admin API request could not be sent
    #[error("HTTP error: {0}")]
    Http(String),

    /// A retrying operation gave up
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Whether a reconnect-and-retry can help.
    ///
    /// Anything not known to be permanent counts as transient, since an idle
    /// connection drop surfaces through many different error shapes. A missing
    /// bucket is transient: `put` recreates it on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::NotFound { .. }
            | StoreError::AccessDenied(_)
            | StoreError::InvalidConfig(_)
            | StoreError::InvalidBucketName(_)
            | StoreError::InvalidKey(_)
            | StoreError::RetriesExhausted { .. } => false,
            StoreError::Service { code, .. } => !is_permanent_code(code),
            _ => true,
        }
    }

    /// True for a missing object or bucket
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound { .. } | StoreError::BucketNotFound(_) => true,
            StoreError::RetriesExhausted { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Attach object context to a service error that names a missing key or bucket
    pub fn for_object(self, bucket: &str, key: &str) -> Self {
        match self {
            StoreError::Service { ref code, .. } if is_missing_key_code(code) => {
                StoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            }
            StoreError::Service { ref code, .. } if code == "NoSuchBucket" => {
                StoreError::BucketNotFound(bucket.to_string())
            }
            other => other,
        }
    }
}

fn is_missing_key_code(code: &str) -> bool {
    matches!(code, "NoSuchKey" | "NotFound")
}

/// Service error codes that no amount of reconnecting will fix
pub(crate) fn is_permanent_code(code: &str) -> bool {
    matches!(
        code,
        "NoSuchKey"
            | "NotFound"
            | "BucketAlreadyExists"
            | "AccessDenied"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "InvalidBucketName"
            | "XMinioAdminBucketQuotaExceeded"
    )
}

impl<E> From<SdkError<E>> for StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    fn from(error: SdkError<E>) -> Self {
        match error {
            SdkError::DispatchFailure(e) => {
                if e.is_timeout() {
                    StoreError::Timeout(format!("{:?}", e))
                } else {
                    StoreError::Network(format!("Network dispatch failure: {:?}", e))
                }
            }
            SdkError::TimeoutError(e) => StoreError::Timeout(format!("{:?}", e)),
            SdkError::ResponseError(e) => StoreError::Network(format!("Response error: {:?}", e)),
            SdkError::ServiceError(e) => {
                let err = e.into_err();
                let code = err.code().unwrap_or("Unknown").to_string();
                let message = err
                    .message()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.to_string());

                match code.as_str() {
                    "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" => {
                        StoreError::AccessDenied(message)
                    }
                    _ => StoreError::Service { code, message },
                }
            }
            other => StoreError::Sdk(format!("{:?}", other)),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else {
            StoreError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_errors_not_retryable() {
        assert!(!StoreError::NotFound {
            bucket: "b".to_string(),
            key: "k".to_string()
        }
        .is_retryable());
        assert!(!StoreError::AccessDenied("denied".to_string()).is_retryable());
        assert!(!StoreError::InvalidConfig("bad".to_string()).is_retryable());
        assert!(!StoreError::InvalidBucketName("Bad".to_string()).is_retryable());
        assert!(!StoreError::InvalidKey("".to_string()).is_retryable());
    }

    #[test]
    fn test_transient_errors_retryable() {
        assert!(StoreError::Network("connection reset".to_string()).is_retryable());
        assert!(StoreError::Timeout("30s".to_string()).is_retryable());
        assert!(StoreError::Disconnected("localhost:9000".to_string()).is_retryable());
        assert!(StoreError::BucketNotFound("b".to_string()).is_retryable());
        assert!(StoreError::Sdk("construction failure".to_string()).is_retryable());
        assert!(StoreError::Service {
            code: "SlowDown".to_string(),
            message: "slow".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_service_error_permanent_codes() {
        let err = StoreError::Service {
            code: "BucketAlreadyExists".to_string(),
            message: "owned by another account".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!is_permanent_code("NoSuchBucket"));
        assert!(is_permanent_code("SignatureDoesNotMatch"));
        assert!(!is_permanent_code("InternalError"));
    }

    #[test]
    fn test_for_object_maps_missing_key() {
        let err = StoreError::Service {
            code: "NoSuchKey".to_string(),
            message: "The specified key does not exist.".to_string(),
        }
        .for_object("docs", "a.txt");

        assert!(matches!(
            err,
            StoreError::NotFound { ref bucket, ref key } if bucket == "docs" && key == "a.txt"
        ));
        assert!(err.is_not_found());

        let err = StoreError::Service {
            code: "NoSuchBucket".to_string(),
            message: "no bucket".to_string(),
        }
        .for_object("docs", "a.txt");
        assert!(matches!(err, StoreError::BucketNotFound(ref b) if b == "docs"));

        let err = StoreError::Network("reset".to_string()).for_object("docs", "a.txt");
        assert!(matches!(err, StoreError::Network(_)));
    }

    #[test]
    fn test_exhausted_is_not_retried_again() {
        let err = StoreError::RetriesExhausted {
            operation: "put",
            attempts: 3,
            source: Box::new(StoreError::Network("reset".to_string())),
        };
        assert!(!err.is_retryable());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "put failed after 3 attempt(s): Network error: reset"
        );
    }

    #[test]
    fn test_error_display_formats() {
        let err = StoreError::NotFound {
            bucket: "my-bucket".to_string(),
            key: "my-key".to_string(),
        };
        assert_eq!(format!("{}", err), "Object not found: my-bucket/my-key");

        let err = StoreError::Admin {
            status: 403,
            body: "denied".to_string(),
        };
        assert_eq!(format!("{}", err), "Admin API error (HTTP 403): denied");

        let err = StoreError::Disconnected("minio:9000".to_string());
        assert_eq!(format!("{}", err), "Not connected to minio:9000");
    }
}
