//! Cooperative cancellation of pipeline runs.
//!
//! The token is checked before each stage and raced against every external
//! call, retry backoff and courtesy delay.

mod token;

pub use token::{CancelCallback, CancellationToken};
