//! Data types that cross port boundaries.
//!
//! [`RuleData`] is the read-only rule content the applier consumes. It mirrors
//! the 5etools JSON shape closely and defaults every field, so a sparse or
//! partly malformed entry still deserializes; the applier then skips what it
//! cannot interpret with a logged warning.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use charbldr_domain::common::eq_for_lookup;

/// Race, subrace, class, subclass, background or feat definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleData {
    pub name: String,
    pub source: String,

    /// `[{ "dex": 2 }, { "choose": { "from": [...], "count": 1 } }]`
    pub ability: Vec<Value>,
    /// Nested 5etools entries; `{type: "entries", name, entries}` become traits
    pub entries: Vec<Value>,

    pub skill_proficiencies: Vec<Value>,
    pub language_proficiencies: Vec<Value>,
    pub tool_proficiencies: Vec<Value>,
    pub weapon_proficiencies: Vec<Value>,
    pub armor_proficiencies: Vec<Value>,

    #[serde(deserialize_with = "one_or_many")]
    pub size: Vec<String>,
    /// A number or `{ "walk": 30, ... }`
    pub speed: Option<Value>,
    pub darkvision: Option<u32>,
    pub resist: Vec<Value>,

    /// Class saving throws (`["str", "con"]`)
    pub proficiency: Vec<Value>,
    pub starting_proficiencies: StartingProficiencies,
    pub hd: Option<HitDice>,

    // Parent links for subraces and subclasses
    pub race_name: Option<String>,
    pub race_source: Option<String>,
    pub class_name: Option<String>,
    pub class_source: Option<String>,
    pub short_name: Option<String>,
    /// Subrace fields that replace rather than add to the parent race's
    /// (`{ "ability": true }`)
    pub overwrite: Option<Value>,

    #[serde(rename = "_copy")]
    pub copy: Option<Value>,
}

impl RuleData {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Parses one rule entry from JSON.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Case-insensitive match on name, and on source when one is given.
    pub fn matches(&self, name: &str, source: Option<&str>) -> bool {
        eq_for_lookup(&self.name, name) && source.map_or(true, |s| eq_for_lookup(&self.source, s))
    }

    /// Whether this entry only references another entry via `_copy`.
    pub fn is_copy(&self) -> bool {
        self.copy.is_some()
    }

    /// Whether this sub-selection replaces the parent's `field` instead of
    /// adding to it.
    pub fn overwrites(&self, field: &str) -> bool {
        self.overwrite
            .as_ref()
            .and_then(|o| o.get(field))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Name a subclass is referred to by (`shortName` when present).
    pub fn display_sub_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }
}

/// Class starting proficiencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartingProficiencies {
    pub armor: Vec<Value>,
    pub weapons: Vec<Value>,
    pub tools: Vec<Value>,
    pub skills: Vec<Value>,
}

/// Hit dice of a class (`{ "number": 1, "faces": 8 }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitDice {
    #[serde(default = "default_one")]
    pub number: u32,
    pub faces: u32,
}

fn default_one() -> u32 {
    1
}

/// Accepts `"M"` as well as `["S", "M"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}
