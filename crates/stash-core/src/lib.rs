pub mod error;
pub mod key;

pub use error::{CacheError, ErrorCategory, Result};
pub use key::{CacheKey, KeyPrefix};
