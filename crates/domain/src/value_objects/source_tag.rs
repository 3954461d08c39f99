//! Source tags and build-source slots.
//!
//! A source tag names which build source granted a ledger entry. Tags must stay
//! stable for the lifetime of a selection so teardown can target them:
//!
//! - `"Race"`, `"Subrace"`, `"Race-linked"` - fixed grants owned by the race slot
//! - `"Race Choice"`, `"Race Choice 1"` - grants resolved through a race choice
//! - `"Default"` - grants every new character starts with
//! - `"Feat: Alert"` - a standalone feat

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::{normalize_for_lookup, starts_with_for_lookup};
use crate::error::DomainError;
use crate::value_objects::Origin;

/// Marker substring that identifies choice-granted tags.
const CHOICE_MARKER: &str = "Choice";

/// A string label identifying which build source granted a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTag(String);

impl SourceTag {
    /// Creates a tag from trimmed input. Empty tags are representable so that
    /// ledgers can reject them with a logged warning instead of a panic.
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self(tag.trim().to_string())
    }

    /// Tag for grants every new character starts with.
    pub fn default_grant() -> Self {
        Self::new("Default")
    }

    /// Tag for a standalone feat.
    pub fn feat(name: &str) -> Self {
        Self::new(format!("Feat: {}", name.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True for tags granted through optional-choice resolution.
    pub fn is_choice(&self) -> bool {
        self.0.contains(CHOICE_MARKER)
    }

    /// Case-insensitive prefix test.
    pub fn starts_with(&self, prefix: &str) -> bool {
        starts_with_for_lookup(&self.0, prefix)
    }

    /// The origin this tag nominally belongs to, if any.
    ///
    /// `Race`, `Subrace`, `Race Choice 2` and `Race-linked` all map to
    /// [`Origin::Race`]; `Default` and feat tags map to none.
    pub fn nominal_origin(&self) -> Option<Origin> {
        let key = normalize_for_lookup(&self.0);
        if key.starts_with("race") || key.starts_with("subrace") {
            Some(Origin::Race)
        } else if key.starts_with("class") || key.starts_with("subclass") {
            Some(Origin::Class)
        } else if key.starts_with("background") {
            Some(Origin::Background)
        } else {
            None
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceTag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for SourceTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A build-source slot on the character.
///
/// Each slot owns a fixed family of tags that its teardown clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSourceKind {
    Race,
    Class,
    Background,
}

impl BuildSourceKind {
    pub const ALL: [BuildSourceKind; 3] = [
        BuildSourceKind::Race,
        BuildSourceKind::Class,
        BuildSourceKind::Background,
    ];

    /// Primary tag (`"Race"`).
    pub fn tag(&self) -> SourceTag {
        SourceTag::new(self.origin().label())
    }

    /// Tag for the sub-selection (`"Subrace"`, `"Subclass"`); backgrounds have none.
    pub fn sub_tag(&self) -> Option<SourceTag> {
        match self {
            Self::Race => Some(SourceTag::new("Subrace")),
            Self::Class => Some(SourceTag::new("Subclass")),
            Self::Background => None,
        }
    }

    /// Tag for feats granted by this slot (`"Race-linked"`).
    pub fn linked_tag(&self) -> SourceTag {
        SourceTag::new(format!("{}-linked", self.origin().label()))
    }

    /// Prefix shared by every choice-resolved tag of this slot (`"Race Choice"`).
    pub fn choice_tag(&self) -> SourceTag {
        self.origin().choice_tag()
    }

    /// The choice-pool origin this slot feeds.
    pub fn origin(&self) -> Origin {
        match self {
            Self::Race => Origin::Race,
            Self::Class => Origin::Class,
            Self::Background => Origin::Background,
        }
    }

    /// Every exact tag owned by this slot (choice tags are matched by prefix).
    pub fn owned_tags(&self) -> Vec<SourceTag> {
        let mut tags = vec![self.tag()];
        tags.extend(self.sub_tag());
        tags.push(self.linked_tag());
        tags
    }

    pub fn as_str(&self) -> &'static str {
        self.origin().as_str()
    }
}

impl fmt::Display for BuildSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BuildSourceKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let origin: Origin = s
            .parse()
            .map_err(|_| DomainError::parse(format!("Unknown build source kind: {}", s)))?;
        Ok(match origin {
            Origin::Race => Self::Race,
            Origin::Class => Self::Class,
            Origin::Background => Self::Background,
        })
    }
}
