//! Optional-choice pools and the combinator that merges the three origins.
//!
//! # Invariants
//!
//! - For every pool: `selected.len() <= allowed` and `selected ⊆ options`
//! - The combined view is always the recombination of the per-origin pools;
//!   per-origin pools are the source of truth for capacity checks

use serde::{Deserialize, Serialize};

use crate::common::{eq_for_lookup, normalize_for_lookup};
use crate::events::SelectionOutcome;
use crate::value_objects::{Origin, ProficiencyType};

/// A capacity-bounded set of selectable names tied to one origin and one type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoicePool {
    allowed: u32,
    options: Vec<String>,
    selected: Vec<String>,
}

impl ChoicePool {
    pub fn allowed(&self) -> u32 {
        self.allowed
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Free capacity.
    pub fn remaining(&self) -> u32 {
        self.allowed.saturating_sub(self.selected.len() as u32)
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|o| eq_for_lookup(o, name))
    }

    /// The stored spelling of a selected name, if selected.
    pub fn find_selected(&self, name: &str) -> Option<&str> {
        self.selected
            .iter()
            .find(|s| eq_for_lookup(s, name))
            .map(String::as_str)
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.find_selected(name).is_some()
    }

    /// Replaces `allowed`/`options`, keeping existing selections that still fit.
    ///
    /// Selections no longer in `options`, or beyond the new allowance, are dropped
    /// and returned so the caller can retract the proficiencies they granted.
    pub(crate) fn set(&mut self, allowed: u32, options: Vec<String>) -> Vec<String> {
        self.allowed = allowed;
        self.options = dedupe(options);

        let mut dropped = Vec::new();
        let mut kept = Vec::new();
        for name in std::mem::take(&mut self.selected) {
            if kept.len() < allowed as usize && self.has_option(&name) {
                kept.push(name);
            } else {
                dropped.push(name);
            }
        }
        self.selected = kept;
        dropped
    }

    /// Validates and records a selection. Returns the stored spelling on success.
    pub(crate) fn select(&mut self, name: &str) -> Result<String, SelectionOutcome> {
        if name.trim().is_empty() {
            return Err(SelectionOutcome::InvalidName);
        }
        let Some(option) = self.options.iter().find(|o| eq_for_lookup(o, name)).cloned() else {
            return Err(SelectionOutcome::NotAnOption);
        };
        if self.is_selected(name) {
            return Err(SelectionOutcome::AlreadySelected);
        }
        if self.selected.len() >= self.allowed as usize {
            return Err(SelectionOutcome::CapacityExhausted {
                allowed: self.allowed,
            });
        }
        self.selected.push(option.clone());
        Ok(option)
    }

    /// Removes a selection. Returns the stored spelling if it was selected.
    pub(crate) fn deselect(&mut self, name: &str) -> Option<String> {
        let index = self.selected.iter().position(|s| eq_for_lookup(s, name))?;
        Some(self.selected.remove(index))
    }

    /// Zeroes the pool, returning what was selected.
    pub(crate) fn reset(&mut self) -> Vec<String> {
        self.allowed = 0;
        self.options.clear();
        std::mem::take(&mut self.selected)
    }

    /// Rebuilds a pool from persisted parts, rejecting invariant violations.
    pub(crate) fn restore(
        allowed: u32,
        options: Vec<String>,
        selected: Vec<String>,
    ) -> Result<Self, String> {
        let pool = Self {
            allowed,
            options: dedupe(options),
            selected: dedupe(selected),
        };
        if pool.selected.len() > allowed as usize {
            return Err(format!(
                "selected {} exceeds allowance {}",
                pool.selected.len(),
                allowed
            ));
        }
        if let Some(stray) = pool.selected.iter().find(|s| !pool.has_option(s)) {
            return Err(format!("selection {} is not an option", stray));
        }
        Ok(pool)
    }
}

/// The merged read view of the race, class, and background pools of one type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedPool {
    pub allowed: u32,
    pub options: Vec<String>,
    pub selected: Vec<String>,
}

/// Per-origin pools of one proficiency type plus their combined view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalProficiency {
    race: ChoicePool,
    class: ChoicePool,
    background: ChoicePool,
    combined: CombinedPool,
}

impl OptionalProficiency {
    pub fn pool(&self, origin: Origin) -> &ChoicePool {
        match origin {
            Origin::Race => &self.race,
            Origin::Class => &self.class,
            Origin::Background => &self.background,
        }
    }

    pub(crate) fn pool_mut(&mut self, origin: Origin) -> &mut ChoicePool {
        match origin {
            Origin::Race => &mut self.race,
            Origin::Class => &mut self.class,
            Origin::Background => &mut self.background,
        }
    }

    pub fn combined(&self) -> &CombinedPool {
        &self.combined
    }

    /// Recomputes the combined view: allowances summed, options and selections
    /// unioned in race, class, background order. Idempotent.
    pub(crate) fn recombine(&mut self) {
        let pools = [&self.race, &self.class, &self.background];
        self.combined = CombinedPool {
            allowed: pools.iter().map(|p| p.allowed).sum(),
            options: dedupe(pools.iter().flat_map(|p| p.options.iter().cloned()).collect()),
            selected: dedupe(pools.iter().flat_map(|p| p.selected.iter().cloned()).collect()),
        };
    }
}

/// Optional pools for every proficiency type. Storage for every type exists
/// from construction, so select/deselect can never hit an uninitialized type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalProficiencies {
    by_type: [OptionalProficiency; ProficiencyType::COUNT],
}

impl OptionalProficiencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, proficiency_type: ProficiencyType) -> &OptionalProficiency {
        &self.by_type[proficiency_type.index()]
    }

    pub(crate) fn get_mut(
        &mut self,
        proficiency_type: ProficiencyType,
    ) -> &mut OptionalProficiency {
        &mut self.by_type[proficiency_type.index()]
    }

    pub fn pool(&self, proficiency_type: ProficiencyType, origin: Origin) -> &ChoicePool {
        self.get(proficiency_type).pool(origin)
    }

    pub(crate) fn pool_mut(
        &mut self,
        proficiency_type: ProficiencyType,
        origin: Origin,
    ) -> &mut ChoicePool {
        self.get_mut(proficiency_type).pool_mut(origin)
    }

    pub fn combined(&self, proficiency_type: ProficiencyType) -> &CombinedPool {
        self.get(proficiency_type).combined()
    }

    pub(crate) fn recombine(&mut self, proficiency_type: ProficiencyType) {
        self.get_mut(proficiency_type).recombine();
    }

    pub(crate) fn recombine_all(&mut self) {
        for optional in self.by_type.iter_mut() {
            optional.recombine();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProficiencyType, &OptionalProficiency)> {
        ProficiencyType::ALL.into_iter().zip(self.by_type.iter())
    }
}

/// Order-preserving, case-insensitive de-duplication.
fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    names
        .into_iter()
        .filter(|n| !n.trim().is_empty() && seen.insert(normalize_for_lookup(n)))
        .collect()
}
