//! Ability score identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// One of the six ability scores.
///
/// The canonical (serialized) form is the lowercase long name, e.g. `"strength"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    /// All abilities in sheet order.
    pub const ALL: [Ability; 6] = [
        Ability::Strength,
        Ability::Dexterity,
        Ability::Constitution,
        Ability::Intelligence,
        Ability::Wisdom,
        Ability::Charisma,
    ];

    /// Canonical long form (`"strength"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strength => "strength",
            Self::Dexterity => "dexterity",
            Self::Constitution => "constitution",
            Self::Intelligence => "intelligence",
            Self::Wisdom => "wisdom",
            Self::Charisma => "charisma",
        }
    }

    /// Three-letter rule-data key (`"str"`).
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::Strength => "str",
            Self::Dexterity => "dex",
            Self::Constitution => "con",
            Self::Intelligence => "int",
            Self::Wisdom => "wis",
            Self::Charisma => "cha",
        }
    }

    /// Display name used for saving-throw proficiencies (`"Strength"`).
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Strength => "Strength",
            Self::Dexterity => "Dexterity",
            Self::Constitution => "Constitution",
            Self::Intelligence => "Intelligence",
            Self::Wisdom => "Wisdom",
            Self::Charisma => "Charisma",
        }
    }

    /// Lenient parse: long names, abbreviations, any case, surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == key || a.abbreviation() == key)
    }

    /// Floor-division ability modifier for a total score.
    pub fn modifier(score: i32) -> i32 {
        (score - 10).div_euclid(2)
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Ability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DomainError::parse(format!("Unknown ability: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_abbreviations_and_long_names() {
        assert_eq!(Ability::parse("str"), Some(Ability::Strength));
        assert_eq!(Ability::parse("STR"), Some(Ability::Strength));
        assert_eq!(Ability::parse(" Wisdom "), Some(Ability::Wisdom));
        assert_eq!(Ability::parse("cha"), Some(Ability::Charisma));
        assert_eq!(Ability::parse(""), None);
        assert_eq!(Ability::parse("luck"), None);
    }

    #[test]
    fn from_str_reports_unknown_ability() {
        let err = "luck".parse::<Ability>().unwrap_err();
        assert!(err.to_string().contains("luck"));
    }

    #[test]
    fn modifier_uses_floor_division() {
        assert_eq!(Ability::modifier(10), 0);
        assert_eq!(Ability::modifier(11), 0);
        assert_eq!(Ability::modifier(9), -1);
        assert_eq!(Ability::modifier(8), -1);
        assert_eq!(Ability::modifier(7), -2);
        assert_eq!(Ability::modifier(20), 5);
    }

    #[test]
    fn serializes_as_long_lowercase_name() {
        let json = serde_json::to_string(&Ability::Constitution).unwrap();
        assert_eq!(json, "\"constitution\"");
    }
}
