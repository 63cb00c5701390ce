//! # Lyricflow
//!
//! A sequential multi-stage generation pipeline.
//!
//! A run takes a user's request, resolves its creative settings from several
//! competing sources, and passes it through an ordered list of stages. Each
//! stage builds a prompt from the accumulated context, calls an external
//! text-generation capability, and stores a validated output for the stages
//! after it. Lyricflow provides:
//!
//! - **Ordered execution**: one stage at a time, each seeing every earlier output
//! - **Classified retries**: transient failures retried with backoff or the
//!   server-suggested wait, permanent ones raised immediately
//! - **Structured output recovery**: truncated or malformed JSON is detected and
//!   the stage is asked again
//! - **Settings resolution**: explicit, scenario, inferred and default values merged
//! - **Progress reporting**: monotonic percentages over callbacks or channels
//! - **Cancellation**: every wait and in-flight call can be cut short
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lyricflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::song()
//!     .with_capability(Arc::new(my_client))
//!     .build()?;
//!
//! let request = RunRequest::new("a song for my old friend")
//!     .with_credentials(Credentials::new(api_key));
//! let artifact = pipeline
//!     .run(request, &LoggingProgressSink::default(), &CancellationToken::new())
//!     .await?;
//! println!("{}", artifact.body());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod invoker;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod settings;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ConfigError, PipelineConfig};
    pub use crate::context::{
        ChatMessage, Credentials, LanguageProfile, PipelineContext, RunIdentity, RunRequest,
    };
    pub use crate::core::{FinalArtifact, PipelineState, StageKind, StageOutput, StageRecord};
    pub use crate::errors::{
        ClassifiedError, ContractErrorInfo, ErrorClass, ErrorSuggestions, InvokeError,
        OutputError, PipelineError, PipelineValidationError, StageFailure, ValidationError,
    };
    pub use crate::invoker::{JitterStrategy, RetryPolicy, StageInvoker};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Orchestrator, PipelineBuilder};
    pub use crate::progress::{
        progress_channel, BroadcastProgressSink, CallbackProgressSink, ChannelProgressSink,
        LoggingProgressSink, NoOpProgressSink, ProgressEvent, ProgressPhase, ProgressSink,
    };
    pub use crate::settings::{
        ExplicitSettings, PartialSettings, RawSettings, ResolvedSettings, Scenario, SettingField,
    };
    pub use crate::stages::{
        song_stages, Capability, CapabilityError, FnStage, OutputContract, Prompt, Stage,
        TemplateStage,
    };
}
