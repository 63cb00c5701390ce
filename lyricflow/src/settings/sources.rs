//! The four settings sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::SettingField;

/// Sentinel explicit value meaning "use my custom value".
pub(crate) const CUSTOM: &str = "custom";

/// Sentinel explicit value meaning "choose for me".
pub(crate) const AUTO: &str = "auto";

/// Returns true if `value` leaves the choice to the pipeline.
pub(crate) fn is_auto(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(AUTO)
}

/// Returns true if `value` is the "Custom" sentinel.
pub(crate) fn is_custom(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(CUSTOM)
}

/// A sparse set of setting values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialSettings {
    values: BTreeMap<SettingField, String>,
}

impl PartialSettings {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value.
    #[must_use]
    pub fn with(mut self, field: SettingField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a value in place.
    pub fn set(&mut self, field: SettingField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    /// Returns the trimmed value for `field` if it is present and non-empty.
    #[must_use]
    pub fn get(&self, field: SettingField) -> Option<&str> {
        self.values
            .get(&field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns true if no field has a non-empty value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        SettingField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Builds a set from a JSON object, ignoring unknown keys and non-string values.
    ///
    /// Lets callers whose inference step returns a loose JSON object pass it
    /// in as the inferred layer of a [`RawSettings`].
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut settings = Self::new();
        if let Some(object) = value.as_object() {
            for (key, value) in object {
                if let (Ok(field), Some(text)) = (key.parse::<SettingField>(), value.as_str()) {
                    settings.set(field, text);
                }
            }
        }
        settings
    }
}

/// The user's explicit choices.
///
/// Each field holds either a concrete value, `"auto"`/empty, or the
/// `"Custom"` sentinel together with a custom value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitSettings {
    /// Chosen values.
    #[serde(default)]
    pub values: PartialSettings,
    /// Custom values used when the chosen value is `"Custom"`.
    #[serde(default)]
    pub custom: PartialSettings,
}

impl ExplicitSettings {
    /// Creates an empty (all auto) set of choices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chosen value for `field`.
    #[must_use]
    pub fn with(mut self, field: SettingField, value: impl Into<String>) -> Self {
        self.values.set(field, value);
        self
    }

    /// Chooses `"Custom"` for `field` with the given custom value.
    #[must_use]
    pub fn with_custom(mut self, field: SettingField, value: impl Into<String>) -> Self {
        self.values.set(field, "Custom");
        self.custom.set(field, value);
        self
    }

    /// Returns the chosen value, or an empty string when unset.
    #[must_use]
    pub fn value(&self, field: SettingField) -> &str {
        self.values.get(field).unwrap_or_default()
    }

    /// Returns the custom value, if one was supplied.
    #[must_use]
    pub fn custom(&self, field: SettingField) -> Option<&str> {
        self.custom.get(field)
    }
}

/// A scenario preset: a named bundle of per-field defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario identifier.
    pub id: String,
    /// Values the scenario implies.
    #[serde(default)]
    pub values: PartialSettings,
}

impl Scenario {
    /// Creates a scenario with no values.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: PartialSettings::new(),
        }
    }

    /// Adds a value.
    #[must_use]
    pub fn with(mut self, field: SettingField, value: impl Into<String>) -> Self {
        self.values.set(field, value);
        self
    }
}

/// Scenario-driven defaults, active only when a scenario was selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualSettings {
    /// The selected scenario, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
}

impl ContextualSettings {
    /// No scenario selected.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Selects a scenario.
    #[must_use]
    pub fn from_scenario(scenario: Scenario) -> Self {
        Self {
            scenario: Some(scenario),
        }
    }

    /// Returns true if a scenario with a non-empty id is selected.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.scenario
            .as_ref()
            .is_some_and(|s| !s.id.trim().is_empty())
    }

    /// Returns the scenario's value for `field` when active.
    ///
    /// The scenario field itself defaults to the scenario id.
    #[must_use]
    pub fn get(&self, field: SettingField) -> Option<&str> {
        if !self.is_active() {
            return None;
        }
        let scenario = self.scenario.as_ref()?;
        scenario.values.get(field).or_else(|| {
            (field == SettingField::Scenario).then(|| scenario.id.trim())
        })
    }
}

/// Static fallbacks; total over every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDefaults {
    #[serde(default)]
    values: BTreeMap<SettingField, String>,
}

impl Default for StaticDefaults {
    fn default() -> Self {
        let values = SettingField::ALL
            .iter()
            .map(|field| (*field, builtin_default(*field).to_string()))
            .collect();
        Self { values }
    }
}

fn builtin_default(field: SettingField) -> &'static str {
    match field {
        SettingField::Category => "Song",
        SettingField::Scenario => "none",
        SettingField::Theme => "Love",
        SettingField::Mood => "Romantic",
        SettingField::Style => "Pop",
        SettingField::Voice => "Solo",
        SettingField::RhymeScheme => "AABB",
        SettingField::Complexity => "Medium",
    }
}

impl StaticDefaults {
    /// Built-in fallbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces built-in fallbacks with the non-empty values in `overrides`.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &PartialSettings) -> Self {
        for field in SettingField::ALL {
            if let Some(value) = overrides.get(field) {
                self.values.insert(field, value.to_string());
            }
        }
        self
    }

    /// Sets a single fallback; empty values are ignored.
    #[must_use]
    pub fn with(self, field: SettingField, value: impl Into<String>) -> Self {
        let overrides = PartialSettings::new().with(field, value);
        self.with_overrides(&overrides)
    }

    /// Returns the fallback for `field`.
    #[must_use]
    pub fn get(&self, field: SettingField) -> &str {
        self.values
            .get(&field)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| builtin_default(field))
    }
}

/// All four settings sources for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSettings {
    /// The user's explicit choices.
    #[serde(default)]
    pub explicit: ExplicitSettings,
    /// Suggestions inferred from the request.
    #[serde(default)]
    pub inferred: PartialSettings,
    /// Scenario-driven defaults.
    #[serde(default)]
    pub contextual: ContextualSettings,
    /// Static fallbacks.
    #[serde(default)]
    pub defaults: StaticDefaults,
}

impl RawSettings {
    /// Creates raw settings with everything on auto.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the explicit choices.
    #[must_use]
    pub fn with_explicit(mut self, explicit: ExplicitSettings) -> Self {
        self.explicit = explicit;
        self
    }

    /// Sets the inferred suggestions.
    #[must_use]
    pub fn with_inferred(mut self, inferred: PartialSettings) -> Self {
        self.inferred = inferred;
        self
    }

    /// Sets the contextual defaults.
    #[must_use]
    pub fn with_contextual(mut self, contextual: ContextualSettings) -> Self {
        self.contextual = contextual;
        self
    }

    /// Sets the static defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: StaticDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_and_custom_sentinels() {
        assert!(is_auto(""));
        assert!(is_auto("  "));
        assert!(is_auto("Auto"));
        assert!(!is_auto("Love"));
        assert!(is_custom(" Custom "));
        assert!(!is_custom("Customs"));
    }

    #[test]
    fn test_partial_settings_ignores_blank_values() {
        let settings = PartialSettings::new()
            .with(SettingField::Mood, "  ")
            .with(SettingField::Theme, " Rain ");

        assert_eq!(settings.get(SettingField::Mood), None);
        assert_eq!(settings.get(SettingField::Theme), Some("Rain"));
        assert!(!settings.is_empty());
        assert!(PartialSettings::new().with(SettingField::Mood, "").is_empty());
    }

    #[test]
    fn test_partial_settings_from_json() {
        let value = serde_json::json!({"mood": "Nostalgic", "tempo": "fast", "style": 3});
        let settings = PartialSettings::from_json(&value);

        assert_eq!(settings.get(SettingField::Mood), Some("Nostalgic"));
        assert_eq!(settings.get(SettingField::Style), None);
    }

    #[test]
    fn test_contextual_inactive_without_scenario_id() {
        let contextual = ContextualSettings::from_scenario(
            Scenario::new(" ").with(SettingField::Mood, "Festive"),
        );
        assert!(!contextual.is_active());
        assert_eq!(contextual.get(SettingField::Mood), None);
    }

    #[test]
    fn test_contextual_scenario_field_defaults_to_id() {
        let contextual = ContextualSettings::from_scenario(Scenario::new("wedding"));
        assert_eq!(contextual.get(SettingField::Scenario), Some("wedding"));
        assert_eq!(contextual.get(SettingField::Theme), None);
    }

    #[test]
    fn test_static_defaults_are_total() {
        let defaults = StaticDefaults::new()
            .with(SettingField::Theme, "Friendship")
            .with(SettingField::Mood, "");

        assert_eq!(defaults.get(SettingField::Theme), "Friendship");
        assert_eq!(defaults.get(SettingField::Mood), "Romantic");
        for field in SettingField::ALL {
            assert!(!defaults.get(field).is_empty());
        }
    }

    #[test]
    fn test_raw_settings_deserialize_with_missing_sources() {
        let raw: RawSettings = serde_json::from_value(serde_json::json!({
            "explicit": {"values": {"theme": "Custom"}, "custom": {"theme": "Reunion"}}
        }))
        .unwrap();

        assert_eq!(raw.explicit.value(SettingField::Theme), "Custom");
        assert_eq!(raw.explicit.custom(SettingField::Theme), Some("Reunion"));
        assert!(raw.inferred.is_empty());
        assert!(!raw.contextual.is_active());
    }
}
