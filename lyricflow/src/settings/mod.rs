//! Settings resolution.
//!
//! A run's creative settings come from four competing sources: the user's
//! explicit choice, a suggestion inferred from the request, the defaults of
//! a selected scenario, and static fallbacks. This module merges them into
//! one fully populated [`ResolvedSettings`] per run.

mod fields;
mod resolver;
mod sources;

pub use fields::SettingField;
pub use resolver::{resolve, resolve_field, resolve_sources, ResolutionSource, ResolvedSettings};
pub use sources::{
    ContextualSettings, ExplicitSettings, PartialSettings, RawSettings, Scenario, StaticDefaults,
};
