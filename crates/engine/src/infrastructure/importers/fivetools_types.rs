//! Root structures of the 5etools JSON data files.
//!
//! Individual entries deserialize straight into [`RuleData`]; these types only
//! describe which array of which file holds them.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::infrastructure::ports::RuleData;

/// Index file mapping source abbreviations to per-source file names.
pub type FiveToolsIndex = BTreeMap<String, String>;

/// `data/races.json`
#[derive(Debug, Default, Deserialize)]
pub struct FiveToolsRaceFile {
    #[serde(default)]
    pub race: Vec<RuleData>,
    #[serde(default)]
    pub subrace: Vec<RuleData>,
}

/// `data/class/class-*.json`
#[derive(Debug, Default, Deserialize)]
pub struct FiveToolsClassFile {
    #[serde(default)]
    pub class: Vec<RuleData>,
    #[serde(default)]
    pub subclass: Vec<RuleData>,
}

/// `data/backgrounds.json`
#[derive(Debug, Default, Deserialize)]
pub struct FiveToolsBackgroundFile {
    #[serde(default)]
    pub background: Vec<RuleData>,
}

/// `data/feats.json`
#[derive(Debug, Default, Deserialize)]
pub struct FiveToolsFeatFile {
    #[serde(default)]
    pub feat: Vec<RuleData>,
}
