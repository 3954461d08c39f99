//! Domain Events
//!
//! Fire-and-forget notifications describing what a mutation did to the build
//! state. The [`Character`](crate::aggregates::Character) aggregate collects them
//! in an outbox; the engine drains the outbox after each completed mutation and
//! publishes the events in order, so observers never see a half-applied state.
//!
//! ## Aggregate Mutation Outcomes
//!
//! The `character_events` submodule contains the return types of aggregate
//! mutations, communicating whether a request was accepted.

pub mod character_events;

pub use character_events::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value_objects::{BuildSourceKind, Origin, ProficiencyType, SourceTag};

/// Domain event for build-state changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BuildEvent {
    /// A source tag was added to a proficiency (the name may already have been granted)
    ProficiencyAdded {
        proficiency_type: ProficiencyType,
        proficiency: String,
        source: SourceTag,
        was_new: bool,
    },
    /// A source (and its choice tags) was stripped from the ledger
    ProficienciesRemovedBySource {
        source: SourceTag,
        removed: BTreeMap<ProficiencyType, Vec<String>>,
    },
    /// An optional selection was retracted because a fixed grant made it redundant
    ProficiencyRefunded {
        proficiency_type: ProficiencyType,
        proficiency: String,
        origin: Origin,
    },
    OptionalSelected {
        proficiency_type: ProficiencyType,
        origin: Origin,
        proficiency: String,
    },
    OptionalDeselected {
        proficiency_type: ProficiencyType,
        origin: Origin,
        proficiency: String,
    },
    /// Coarse "something changed, resynchronize" signal
    CharacterUpdated { kind: Option<BuildSourceKind> },
}

impl BuildEvent {
    /// Stable event name for logging and routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ProficiencyAdded { .. } => "proficiencyAdded",
            Self::ProficienciesRemovedBySource { .. } => "proficienciesRemovedBySource",
            Self::ProficiencyRefunded { .. } => "proficiencyRefunded",
            Self::OptionalSelected { .. } => "optionalSelected",
            Self::OptionalDeselected { .. } => "optionalDeselected",
            Self::CharacterUpdated { .. } => "characterUpdated",
        }
    }

    pub fn is_character_updated(&self) -> bool {
        matches!(self, Self::CharacterUpdated { .. })
    }
}
