//! Per-field precedence resolution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::sources::{is_auto, is_custom};
use super::{
    ContextualSettings, ExplicitSettings, PartialSettings, RawSettings, SettingField,
    StaticDefaults,
};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The user picked "Custom" and supplied a value.
    Custom,
    /// The user's explicit choice.
    Explicit,
    /// The selected scenario's default.
    Contextual,
    /// A suggestion inferred from the request.
    Inferred,
    /// The static fallback.
    Default,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom => write!(f, "custom"),
            Self::Explicit => write!(f, "explicit"),
            Self::Contextual => write!(f, "contextual"),
            Self::Inferred => write!(f, "inferred"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Fully populated settings for one run.
///
/// Built only by the resolver, so every field holds a non-empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSettings {
    /// Kind of piece.
    pub category: String,
    /// Scenario identifier.
    pub scenario: String,
    /// Theme.
    pub theme: String,
    /// Mood.
    pub mood: String,
    /// Style.
    pub style: String,
    /// Singer / voice configuration.
    pub voice: String,
    /// Rhyme and structure scheme.
    pub rhyme_scheme: String,
    /// Complexity level.
    pub complexity: String,
    /// The source of each field's value.
    pub sources: BTreeMap<SettingField, ResolutionSource>,
}

impl ResolvedSettings {
    /// Returns the value of `field`.
    #[must_use]
    pub fn get(&self, field: SettingField) -> &str {
        match field {
            SettingField::Category => &self.category,
            SettingField::Scenario => &self.scenario,
            SettingField::Theme => &self.theme,
            SettingField::Mood => &self.mood,
            SettingField::Style => &self.style,
            SettingField::Voice => &self.voice,
            SettingField::RhymeScheme => &self.rhyme_scheme,
            SettingField::Complexity => &self.complexity,
        }
    }

    /// Returns where `field`'s value came from.
    #[must_use]
    pub fn source(&self, field: SettingField) -> ResolutionSource {
        self.sources
            .get(&field)
            .copied()
            .unwrap_or(ResolutionSource::Default)
    }

    /// Returns every field and value, in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (SettingField, &str)> + '_ {
        SettingField::ALL.iter().map(move |f| (*f, self.get(*f)))
    }

    /// Renders the settings as `key: value` lines for prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        self.iter()
            .map(|(field, value)| format!("{field}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Resolves one field.
///
/// 1. Explicit `"Custom"` with a non-empty custom value wins.
/// 2. With a scenario selected, an explicit non-auto value wins; an auto
///    value takes the scenario's value for the field when it has one.
/// 3. An auto value takes the inferred suggestion when there is one.
/// 4. An auto value otherwise takes the static default.
/// 5. Otherwise the explicit value is used as given.
///
/// `"Custom"` without a custom value counts as auto.
#[must_use]
pub fn resolve_field(
    field: SettingField,
    explicit: &ExplicitSettings,
    inferred: &PartialSettings,
    contextual: &ContextualSettings,
    defaults: &StaticDefaults,
) -> (String, ResolutionSource) {
    let chosen = explicit.value(field);

    if is_custom(chosen) {
        if let Some(custom) = explicit.custom(field) {
            return (custom.to_string(), ResolutionSource::Custom);
        }
    }

    let auto = is_auto(chosen) || is_custom(chosen);

    if contextual.is_active() {
        if !auto {
            return (chosen.to_string(), ResolutionSource::Explicit);
        }
        if let Some(value) = contextual.get(field) {
            return (value.to_string(), ResolutionSource::Contextual);
        }
    }

    if auto {
        if let Some(value) = inferred.get(field) {
            return (value.to_string(), ResolutionSource::Inferred);
        }
        return (defaults.get(field).to_string(), ResolutionSource::Default);
    }

    (chosen.to_string(), ResolutionSource::Explicit)
}

/// Resolves every field from the four sources.
///
/// Pure: the result depends only on the arguments.
#[must_use]
pub fn resolve_sources(
    explicit: &ExplicitSettings,
    inferred: &PartialSettings,
    contextual: &ContextualSettings,
    defaults: &StaticDefaults,
) -> ResolvedSettings {
    let mut values: BTreeMap<SettingField, String> = BTreeMap::new();
    let mut sources = BTreeMap::new();

    for field in SettingField::ALL {
        let (value, source) = resolve_field(field, explicit, inferred, contextual, defaults);
        values.insert(field, value);
        sources.insert(field, source);
    }

    let mut take = |field: SettingField| values.remove(&field).unwrap_or_default();

    ResolvedSettings {
        category: take(SettingField::Category),
        scenario: take(SettingField::Scenario),
        theme: take(SettingField::Theme),
        mood: take(SettingField::Mood),
        style: take(SettingField::Style),
        voice: take(SettingField::Voice),
        rhyme_scheme: take(SettingField::RhymeScheme),
        complexity: take(SettingField::Complexity),
        sources,
    }
}

/// Resolves a run's raw settings.
#[must_use]
pub fn resolve(raw: &RawSettings) -> ResolvedSettings {
    resolve_sources(&raw.explicit, &raw.inferred, &raw.contextual, &raw.defaults)
}
