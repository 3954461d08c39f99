//! Proficiency categories and choice-pool origins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;
use crate::value_objects::SourceTag;

/// The category a proficiency belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProficiencyType {
    Skills,
    Languages,
    Tools,
    Armor,
    Weapons,
    SavingThrows,
}

impl ProficiencyType {
    pub const COUNT: usize = 6;

    pub const ALL: [ProficiencyType; Self::COUNT] = [
        ProficiencyType::Skills,
        ProficiencyType::Languages,
        ProficiencyType::Tools,
        ProficiencyType::Armor,
        ProficiencyType::Weapons,
        ProficiencyType::SavingThrows,
    ];

    /// Position in [`ProficiencyType::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::Skills => 0,
            Self::Languages => 1,
            Self::Tools => 2,
            Self::Armor => 3,
            Self::Weapons => 4,
            Self::SavingThrows => 5,
        }
    }

    /// Persisted key (`"savingThrows"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skills => "skills",
            Self::Languages => "languages",
            Self::Tools => "tools",
            Self::Armor => "armor",
            Self::Weapons => "weapons",
            Self::SavingThrows => "savingThrows",
        }
    }
}

impl fmt::Display for ProficiencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProficiencyType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::parse(format!("Unknown proficiency type: {}", s)))
    }
}

/// One of the three contributors to a combined optional-choice pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Race,
    Class,
    Background,
}

impl Origin {
    pub const ALL: [Origin; 3] = [Origin::Race, Origin::Class, Origin::Background];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Race => "race",
            Self::Class => "class",
            Self::Background => "background",
        }
    }

    /// Capitalized label used to build source tags (`"Race"`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Race => "Race",
            Self::Class => "Class",
            Self::Background => "Background",
        }
    }

    /// Tag carried by proficiencies granted through this origin's choice pool.
    pub fn choice_tag(&self) -> SourceTag {
        SourceTag::new(format!("{} Choice", self.label()))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Origin {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "race" => Ok(Self::Race),
            "class" => Ok(Self::Class),
            "background" => Ok(Self::Background),
            _ => Err(DomainError::parse(format!("Unknown origin: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proficiency_type_round_trips_through_str() {
        for t in ProficiencyType::ALL {
            assert_eq!(t.as_str().parse::<ProficiencyType>().unwrap(), t);
        }
        assert!("feats".parse::<ProficiencyType>().is_err());
    }

    #[test]
    fn saving_throws_serialize_camel_case() {
        let json = serde_json::to_string(&ProficiencyType::SavingThrows).unwrap();
        assert_eq!(json, "\"savingThrows\"");
    }

    #[test]
    fn origin_choice_tags() {
        assert_eq!(Origin::Race.choice_tag().as_str(), "Race Choice");
        assert_eq!(Origin::Background.choice_tag().as_str(), "Background Choice");
        assert_eq!("CLASS".parse::<Origin>().unwrap(), Origin::Class);
    }
}
