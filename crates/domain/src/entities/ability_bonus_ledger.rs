//! Ability bonus ledger - per-ability `{value, source}` contributions.
//!
//! # Invariants
//!
//! - At most one entry per `(ability, source)`; re-adding overwrites the value
//! - Abilities with no entries are not stored, so a cleared ledger equals a fresh one

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value_objects::{Ability, SourceTag};

/// A single contribution to an ability score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityBonus {
    pub value: i32,
    pub source: SourceTag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbilityBonusLedger {
    entries: BTreeMap<Ability, Vec<AbilityBonus>>,
}

impl AbilityBonusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bonus by raw ability key (`"str"`, `"Strength"`, ...).
    ///
    /// Unknown or empty keys and empty sources are logged and ignored.
    /// Returns whether the ledger changed.
    pub fn add(&mut self, ability: &str, value: i32, source: &SourceTag) -> bool {
        match Ability::parse(ability) {
            Some(ability) => self.add_bonus(ability, value, source),
            None => {
                tracing::warn!(
                    ability = %ability,
                    source = %source,
                    "Ignoring ability bonus for unknown ability"
                );
                false
            }
        }
    }

    /// Adds or replaces the bonus `source` contributes to `ability`.
    pub fn add_bonus(&mut self, ability: Ability, value: i32, source: &SourceTag) -> bool {
        if source.is_empty() {
            tracing::warn!(ability = %ability, "Ignoring ability bonus with empty source");
            return false;
        }

        let bonuses = self.entries.entry(ability).or_default();
        match bonuses.iter_mut().find(|b| &b.source == source) {
            Some(existing) => {
                if existing.value == value {
                    return false;
                }
                existing.value = value;
            }
            None => bonuses.push(AbilityBonus {
                value,
                source: source.clone(),
            }),
        }

        tracing::debug!(ability = %ability, value, source = %source, "Ability bonus recorded");
        true
    }

    /// Removes every entry whose source equals `source` exactly. Returns the count removed.
    pub fn clear_by_source(&mut self, source: &str) -> usize {
        self.retain(|bonus| bonus.source.as_str() != source)
    }

    /// Removes every entry whose source starts with `prefix`, ignoring case.
    pub fn clear_by_source_prefix(&mut self, prefix: &str) -> usize {
        if prefix.trim().is_empty() {
            tracing::warn!("Refusing to clear ability bonuses by an empty prefix");
            return 0;
        }
        self.retain(|bonus| !bonus.source.starts_with(prefix))
    }

    fn retain(&mut self, mut keep: impl FnMut(&AbilityBonus) -> bool) -> usize {
        let mut removed = 0;
        for bonuses in self.entries.values_mut() {
            let before = bonuses.len();
            bonuses.retain(&mut keep);
            removed += before - bonuses.len();
        }
        self.entries.retain(|_, bonuses| !bonuses.is_empty());
        removed
    }

    /// Contributions to one ability, in insertion order.
    pub fn entries(&self, ability: Ability) -> &[AbilityBonus] {
        self.entries.get(&ability).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sum of all contributions to one ability.
    pub fn total(&self, ability: Ability) -> i32 {
        self.entries(ability).iter().map(|b| b.value).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ability, &[AbilityBonus])> {
        self.entries.iter().map(|(a, b)| (*a, b.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
