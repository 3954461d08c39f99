//! Trait ledger - name-keyed racial/class features with their granting source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value_objects::SourceTag;

/// A named trait and the source that granted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitEntry {
    pub description: String,
    pub source: SourceTag,
}

/// Traits keyed by name. Names are unique: a later add with the same name replaces
/// the earlier entry even when it comes from a different source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitLedger {
    traits: BTreeMap<String, TraitEntry>,
}

impl TraitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the trait `name`. Returns the replaced entry, if any.
    pub fn add(
        &mut self,
        name: &str,
        description: impl Into<String>,
        source: &SourceTag,
    ) -> Option<TraitEntry> {
        let name = name.trim();
        if name.is_empty() || source.is_empty() {
            tracing::warn!(
                name = %name,
                source = %source,
                "Ignoring trait with empty name or source"
            );
            return None;
        }

        let previous = self.traits.insert(
            name.to_string(),
            TraitEntry {
                description: description.into(),
                source: source.clone(),
            },
        );
        if let Some(prev) = &previous {
            if &prev.source != source {
                tracing::warn!(
                    name = %name,
                    previous_source = %prev.source,
                    source = %source,
                    "Trait name collision, later source shadows earlier"
                );
            }
        }
        previous
    }

    /// Removes every trait whose source equals `source`. Returns the count removed.
    pub fn clear_by_source(&mut self, source: &str) -> usize {
        let before = self.traits.len();
        self.traits.retain(|_, entry| entry.source.as_str() != source);
        before - self.traits.len()
    }

    pub fn get(&self, name: &str) -> Option<&TraitEntry> {
        self.traits.get(name.trim())
    }

    /// Traits in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TraitEntry)> {
        self.traits.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }
}
