//! The stage invoker: classified errors and retry with backoff.

mod classify;
#[cfg(test)]
mod invoker_tests;
mod retry;

pub use classify::{class_of, classify, classify_message, parse_retry_after};
pub use retry::{Invocation, JitterStrategy, RetryNotice, RetryPolicy, StageInvoker};
