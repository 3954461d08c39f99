//! Proficiency ledger - granted proficiencies and the sources behind each one.
//!
//! # Invariants
//!
//! - A name is granted for a type iff its source set is non-empty; the ledger
//!   stores one [`ProficiencyGrant`] per name and drops it when its last tag goes
//! - Names are keyed by [`normalize_for_lookup`], so `"stealth"` and `"Stealth"`
//!   are the same grant; the display spelling is the one first granted

use std::collections::{BTreeMap, BTreeSet};

use crate::common::normalize_for_lookup;
use crate::value_objects::{ProficiencyType, SourceTag};

/// One granted proficiency and every tag currently granting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProficiencyGrant {
    name: String,
    sources: BTreeSet<SourceTag>,
}

impl ProficiencyGrant {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &BTreeSet<SourceTag> {
        &self.sources
    }

    /// True if at least one granting tag is not a choice tag.
    pub fn is_fixed(&self) -> bool {
        self.sources.iter().any(|s| !s.is_choice())
    }
}

/// Result of removing a single tag from a single name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRemoval {
    /// The name was not granted, or not by that tag
    NotFound,
    /// The tag was removed; other tags still grant the name
    Retained,
    /// The tag was the last one; the name is no longer granted
    Removed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProficiencyLedger {
    by_type: BTreeMap<ProficiencyType, BTreeMap<String, ProficiencyGrant>>,
}

impl ProficiencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `source` grants `name`. Returns `true` if the name was not
    /// granted before (`wasNew`). Empty names or sources are logged and ignored.
    pub fn add(
        &mut self,
        proficiency_type: ProficiencyType,
        name: &str,
        source: &SourceTag,
    ) -> bool {
        let name = name.trim();
        if name.is_empty() || source.is_empty() {
            tracing::warn!(
                proficiency_type = %proficiency_type,
                name = %name,
                source = %source,
                "Ignoring proficiency with empty name or source"
            );
            return false;
        }

        let grants = self.by_type.entry(proficiency_type).or_default();
        let key = normalize_for_lookup(name);
        let was_new = !grants.contains_key(&key);
        grants
            .entry(key)
            .or_insert_with(|| ProficiencyGrant {
                name: name.to_string(),
                sources: BTreeSet::new(),
            })
            .sources
            .insert(source.clone());

        tracing::debug!(
            proficiency_type = %proficiency_type,
            name = %name,
            source = %source,
            was_new,
            "Proficiency granted"
        );
        was_new
    }

    /// Strips `source` (and every `"<source> Choice…"` tag) from all names of all types.
    ///
    /// Names that lost at least one tag are reported per type, whether or not they
    /// are still granted by something else.
    pub fn remove_by_source(&mut self, source: &str) -> BTreeMap<ProficiencyType, Vec<String>> {
        let mut removed: BTreeMap<ProficiencyType, Vec<String>> = BTreeMap::new();
        if source.trim().is_empty() {
            tracing::warn!("Refusing to remove proficiencies by an empty source");
            return removed;
        }
        let choice_prefix = format!("{} Choice", source.trim());

        for (proficiency_type, grants) in self.by_type.iter_mut() {
            for grant in grants.values_mut() {
                let before = grant.sources.len();
                grant
                    .sources
                    .retain(|tag| tag.as_str() != source && !tag.starts_with(&choice_prefix));
                if grant.sources.len() != before {
                    removed
                        .entry(*proficiency_type)
                        .or_default()
                        .push(grant.name.clone());
                }
            }
            grants.retain(|_, grant| !grant.sources.is_empty());
        }
        self.by_type.retain(|_, grants| !grants.is_empty());

        if !removed.is_empty() {
            tracing::debug!(
                source = %source,
                types = removed.len(),
                "Proficiencies removed by source"
            );
        }
        removed
    }

    /// Removes exactly one tag from exactly one name.
    pub fn remove_source(
        &mut self,
        proficiency_type: ProficiencyType,
        name: &str,
        source: &SourceTag,
    ) -> SourceRemoval {
        let key = normalize_for_lookup(name);
        let Some(grants) = self.by_type.get_mut(&proficiency_type) else {
            return SourceRemoval::NotFound;
        };
        let Some(grant) = grants.get_mut(&key) else {
            return SourceRemoval::NotFound;
        };
        if !grant.sources.remove(source) {
            return SourceRemoval::NotFound;
        }

        let outcome = if grant.sources.is_empty() {
            grants.remove(&key);
            SourceRemoval::Removed
        } else {
            SourceRemoval::Retained
        };
        if grants.is_empty() {
            self.by_type.remove(&proficiency_type);
        }
        outcome
    }

    /// Case-insensitive membership test.
    pub fn has(&self, proficiency_type: ProficiencyType, name: &str) -> bool {
        self.grant(proficiency_type, name).is_some()
    }

    /// True iff some tag granting `name` is not a choice tag.
    pub fn is_granted_by_fixed_source(
        &self,
        proficiency_type: ProficiencyType,
        name: &str,
    ) -> bool {
        self.grant(proficiency_type, name)
            .map(ProficiencyGrant::is_fixed)
            .unwrap_or(false)
    }

    pub fn grant(
        &self,
        proficiency_type: ProficiencyType,
        name: &str,
    ) -> Option<&ProficiencyGrant> {
        self.by_type
            .get(&proficiency_type)?
            .get(&normalize_for_lookup(name))
    }

    /// Grants for one type, ordered by lookup key.
    pub fn grants(
        &self,
        proficiency_type: ProficiencyType,
    ) -> impl Iterator<Item = &ProficiencyGrant> {
        self.by_type
            .get(&proficiency_type)
            .into_iter()
            .flat_map(|grants| grants.values())
    }

    /// Display names granted for one type.
    pub fn names(&self, proficiency_type: ProficiencyType) -> Vec<&str> {
        self.grants(proficiency_type).map(ProficiencyGrant::name).collect()
    }

    /// Iterates every (type, grant) pair.
    pub fn iter(&self) -> impl Iterator<Item = (ProficiencyType, &ProficiencyGrant)> {
        self.by_type
            .iter()
            .flat_map(|(t, grants)| grants.values().map(move |g| (*t, g)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> SourceTag {
        SourceTag::new(s)
    }

    const SKILLS: ProficiencyType = ProficiencyType::Skills;

    mod add {
        use super::*;

        #[test]
        fn reports_was_new_only_for_first_grant() {
            let mut ledger = ProficiencyLedger::new();
            assert!(ledger.add(SKILLS, "Stealth", &tag("Race")));
            assert!(!ledger.add(SKILLS, "stealth", &tag("Class")));

            let grant = ledger.grant(SKILLS, "STEALTH").unwrap();
            assert_eq!(grant.name(), "Stealth");
            assert_eq!(grant.sources().len(), 2);
        }

        #[test]
        fn empty_name_or_source_is_ignored() {
            let mut ledger = ProficiencyLedger::new();
            assert!(!ledger.add(SKILLS, " ", &tag("Race")));
            assert!(!ledger.add(SKILLS, "Arcana", &tag("")));
            assert!(ledger.names(SKILLS).is_empty());
        }
    }

    mod remove_by_source {
        use super::*;

        #[test]
        fn strips_choice_tags_of_the_same_source() {
            let mut ledger = ProficiencyLedger::new();
            ledger.add(SKILLS, "Stealth", &tag("Race Choice"));

            let removed = ledger.remove_by_source("Race");
            assert_eq!(removed.get(&SKILLS), Some(&vec!["Stealth".to_string()]));
            assert!(!ledger.has(SKILLS, "Stealth"));
        }

        #[test]
        fn name_survives_when_another_source_grants_it() {
            let mut ledger = ProficiencyLedger::new();
            ledger.add(SKILLS, "Stealth", &tag("Race Choice"));
            ledger.add(SKILLS, "Stealth", &tag("Background"));

            let removed = ledger.remove_by_source("Race");
            assert_eq!(removed.get(&SKILLS).map(Vec::len), Some(1));
            assert!(ledger.has(SKILLS, "Stealth"));
            assert!(ledger.is_granted_by_fixed_source(SKILLS, "Stealth"));
        }

        #[test]
        fn does_not_touch_tags_that_merely_share_a_prefix() {
            let mut ledger = ProficiencyLedger::new();
            ledger.add(SKILLS, "Arcana", &tag("Race-linked"));
            ledger.add(SKILLS, "History", &tag("Subrace"));

            let removed = ledger.remove_by_source("Race");
            assert!(removed.is_empty());
            assert!(ledger.has(SKILLS, "Arcana"));
            assert!(ledger.has(SKILLS, "History"));
        }

        #[test]
        fn leaves_no_empty_storage_behind() {
            let mut ledger = ProficiencyLedger::new();
            ledger.add(ProficiencyType::Tools, "Thieves' Tools", &tag("Background"));
            ledger.remove_by_source("Background");
            assert_eq!(ledger, ProficiencyLedger::new());
        }
    }

    mod remove_source {
        use super::*;

        #[test]
        fn removes_only_the_targeted_tag() {
            let mut ledger = ProficiencyLedger::new();
            ledger.add(SKILLS, "Perception", &tag("Race Choice"));
            ledger.add(SKILLS, "Perception", &tag("Class Choice"));

            assert_eq!(
                ledger.remove_source(SKILLS, "perception", &tag("Race Choice")),
                SourceRemoval::Retained
            );
            assert_eq!(
                ledger.remove_source(SKILLS, "Perception", &tag("Race Choice")),
                SourceRemoval::NotFound
            );
            assert_eq!(
                ledger.remove_source(SKILLS, "Perception", &tag("Class Choice")),
                SourceRemoval::Removed
            );
            assert!(!ledger.has(SKILLS, "Perception"));
        }
    }

    #[test]
    fn fixed_source_detection_ignores_choice_tags() {
        let mut ledger = ProficiencyLedger::new();
        ledger.add(SKILLS, "Insight", &tag("Class Choice"));
        assert!(!ledger.is_granted_by_fixed_source(SKILLS, "Insight"));

        ledger.add(SKILLS, "Insight", &tag("Default"));
        assert!(ledger.is_granted_by_fixed_source(SKILLS, "Insight"));
        assert!(!ledger.is_granted_by_fixed_source(SKILLS, "Medicine"));
    }
}
