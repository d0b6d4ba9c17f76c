use thiserror::Error;

/// Error taxonomy for the cache layer.
///
/// Connectivity errors degrade the availability state and are never
/// surfaced to cache callers on the read/write paths; everything else is
/// either swallowed as a miss (serialization), counted (overflow), or
/// logged and tolerated (shutdown timeout).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("store unreachable: {0}")]
    Connectivity(String),

    #[error("store data error: {0}")]
    Data(String),

    #[error("cached value could not be decoded: {0}")]
    Serialization(String),

    #[error("write queue full, operation dropped")]
    QueueOverflow,

    #[error("shutdown flush timed out with {pending} operations pending")]
    ShutdownTimeout { pending: usize },

    #[error("invalid key prefix: {0}")]
    InvalidPrefix(String),
}

impl CacheError {
    /// Create a new Connectivity error
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    /// Create a new Data error
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new ShutdownTimeout error
    pub fn shutdown_timeout(pending: usize) -> Self {
        Self::ShutdownTimeout { pending }
    }

    /// Create a new InvalidPrefix error
    pub fn invalid_prefix(message: impl Into<String>) -> Self {
        Self::InvalidPrefix(message.into())
    }

    /// Whether this error means the store could not be reached.
    ///
    /// Only connectivity errors feed availability degradation; a data error
    /// means the store answered and the connection is healthy.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connectivity(_) => ErrorCategory::Connectivity,
            Self::Data(_) => ErrorCategory::Data,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::QueueOverflow => ErrorCategory::Overflow,
            Self::ShutdownTimeout { .. } => ErrorCategory::Shutdown,
            Self::InvalidPrefix(_) => ErrorCategory::Validation,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connectivity,
    Data,
    Serialization,
    Overflow,
    Shutdown,
    Validation,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::Data => write!(f, "data"),
            Self::Serialization => write!(f, "serialization"),
            Self::Overflow => write!(f, "overflow"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// Convenience result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        let err = CacheError::connectivity("connection refused");
        assert_eq!(err.to_string(), "store unreachable: connection refused");
        assert!(err.is_connectivity());
        assert_eq!(err.category(), ErrorCategory::Connectivity);
    }

    #[test]
    fn test_data_error_is_not_connectivity() {
        let err = CacheError::data("WRONGTYPE operation against a key");
        assert!(!err.is_connectivity());
        assert_eq!(err.category(), ErrorCategory::Data);
    }

    #[test]
    fn test_serialization_error() {
        let err = CacheError::serialization("unexpected msgpack marker");
        assert!(!err.is_connectivity());
        assert_eq!(err.category(), ErrorCategory::Serialization);
        assert!(err.to_string().contains("unexpected msgpack marker"));
    }

    #[test]
    fn test_queue_overflow() {
        let err = CacheError::QueueOverflow;
        assert_eq!(err.to_string(), "write queue full, operation dropped");
        assert_eq!(err.category(), ErrorCategory::Overflow);
    }

    #[test]
    fn test_shutdown_timeout_message() {
        let err = CacheError::shutdown_timeout(42);
        assert_eq!(
            err.to_string(),
            "shutdown flush timed out with 42 operations pending"
        );
        assert_eq!(err.category(), ErrorCategory::Shutdown);
    }

    #[test]
    fn test_invalid_prefix() {
        let err = CacheError::invalid_prefix("empty prefix");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_errors_are_cloneable() {
        // Flush confirmations fan one outcome out to several waiters.
        let err = CacheError::connectivity("timeout");
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Connectivity.to_string(), "connectivity");
        assert_eq!(ErrorCategory::Data.to_string(), "data");
        assert_eq!(ErrorCategory::Serialization.to_string(), "serialization");
        assert_eq!(ErrorCategory::Overflow.to_string(), "overflow");
        assert_eq!(ErrorCategory::Shutdown.to_string(), "shutdown");
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
    }

    #[test]
    fn test_result_type_usage() {
        fn miss() -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        assert!(miss().is_ok());
    }
}
