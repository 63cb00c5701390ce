//! Progress reporting for pipeline runs.
//!
//! The orchestrator emits [`ProgressEvent`]s synchronously to a
//! [`ProgressSink`]. Sinks decide what to do with them: log them, forward
//! them over a channel to one consumer, broadcast them to many, or hand
//! them to a callback. Events are not buffered for late subscribers.

mod channel;
mod event;
mod sink;
mod tracker;

pub use channel::{progress_channel, BroadcastProgressSink, ChannelProgressSink};
pub use event::{ProgressEvent, ProgressLine, ProgressPhase};
pub use sink::{
    CallbackProgressSink, CollectingProgressSink, FanoutProgressSink, LoggingProgressSink,
    NoOpProgressSink, ProgressSink,
};
pub use tracker::{ProgressReporter, ProgressTracker};
