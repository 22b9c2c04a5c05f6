//! Utility modules for hts-classifier

pub mod retry;

pub use retry::{retry_oracle, RetryPolicy};
