//! Core utilities and types shared across all edgecert crates

pub mod retry;
pub mod types;

pub use retry::{poll_until, Attempt, RetryExhausted, RetryPolicy};
pub use types::UtcDateTime;
