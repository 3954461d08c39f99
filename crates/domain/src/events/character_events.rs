//! Character-related mutation outcomes
//!
//! These enums communicate what happened when build state was modified,
//! allowing callers to surface rejections to the user without treating them
//! as errors.

use crate::value_objects::Ability;

/// Outcome of selecting an optional proficiency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Selection recorded and the choice tag granted
    Selected,
    /// Empty or whitespace-only name
    InvalidName,
    /// Name is not among the pool's options
    NotAnOption,
    /// Name is already selected in this pool
    AlreadySelected,
    /// Pool has no free capacity
    CapacityExhausted { allowed: u32 },
    /// Name is already granted by a fixed source, so choosing it would waste a slot
    AlreadyGranted,
}

impl SelectionOutcome {
    pub fn is_selected(&self) -> bool {
        matches!(self, Self::Selected)
    }
}

/// Outcome of resolving a pending "choose N abilities" grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbilityChoiceOutcome {
    /// Picks recorded as ability bonuses
    Resolved { source: String, picks: Vec<Ability> },
    /// No pending choice at this index
    NoSuchChoice { index: usize },
    /// Pick count does not match the choice's `count`
    WrongCount { expected: u32, got: usize },
    /// A pick is not in the choice's `from` list
    NotAllowed { ability: Ability },
    /// The same ability was picked twice
    Duplicate { ability: Ability },
}

impl AbilityChoiceOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}
