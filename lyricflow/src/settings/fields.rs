//! Configurable setting fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A creative setting that is resolved independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingField {
    /// Kind of piece (song, poem, jingle).
    Category,
    /// Selected scenario preset identifier.
    Scenario,
    /// What the piece is about.
    Theme,
    /// Emotional tone.
    Mood,
    /// Genre or stylistic register.
    Style,
    /// Singer / voice configuration.
    Voice,
    /// Rhyme and structure scheme.
    RhymeScheme,
    /// Language complexity level.
    Complexity,
}

impl SettingField {
    /// Every field, in resolution order.
    pub const ALL: [Self; 8] = [
        Self::Category,
        Self::Scenario,
        Self::Theme,
        Self::Mood,
        Self::Style,
        Self::Voice,
        Self::RhymeScheme,
        Self::Complexity,
    ];

    /// Returns the snake_case key used in serialized settings.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Scenario => "scenario",
            Self::Theme => "theme",
            Self::Mood => "mood",
            Self::Style => "style",
            Self::Voice => "voice",
            Self::RhymeScheme => "rhyme_scheme",
            Self::Complexity => "complexity",
        }
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SettingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.key() == normalized)
            .or(match normalized.as_str() {
                "scenario_id" => Some(Self::Scenario),
                "singer" | "singer_config" => Some(Self::Voice),
                "rhyme" | "structure" => Some(Self::RhymeScheme),
                _ => None,
            })
            .ok_or_else(|| format!("unknown setting field '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip_through_from_str() {
        for field in SettingField::ALL {
            assert_eq!(field.key().parse::<SettingField>(), Ok(field));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("Singer".parse::<SettingField>(), Ok(SettingField::Voice));
        assert_eq!("rhyme-scheme".parse::<SettingField>(), Ok(SettingField::RhymeScheme));
        assert_eq!("scenario_id".parse::<SettingField>(), Ok(SettingField::Scenario));
        assert!("tempo".parse::<SettingField>().is_err());
    }

    #[test]
    fn test_serialize_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(SettingField::RhymeScheme, "AABB");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"rhyme_scheme":"AABB"}"#);
    }
}
