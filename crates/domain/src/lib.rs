//! Character build-state reconciliation domain.
//!
//! Pure domain layer: value objects, ledgers, the refund reconciler and the
//! [`Character`] aggregate. No I/O.

extern crate self as charbldr_domain;

pub mod aggregates;
pub mod common;
pub mod entities;
pub mod error;
pub mod events;
pub mod ids;
pub mod value_objects;

pub use aggregates::{BuildIdentity, Character, PendingAbilityChoice, PersistedCharacter};
pub use entities::{
    AbilityBonus, AbilityBonusLedger, ChoicePool, CombinedPool, OptionalProficiencies,
    OptionalProficiency, ProficiencyGrant, ProficiencyLedger, RefundReconciler, SourceRemoval,
    TraitEntry, TraitLedger,
};
pub use error::DomainError;
pub use events::{AbilityChoiceOutcome, BuildEvent, SelectionOutcome};
pub use ids::CharacterId;
pub use value_objects::{Ability, BuildSourceKind, Origin, ProficiencyType, SourceTag};
