//! Utility modules.

pub mod file;
pub mod retry;
pub mod similarity;
pub mod text;

pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
