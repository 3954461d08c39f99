//! Aggregate roots - domain objects that own their related data
//!
//! The [`Character`] aggregate:
//! - Owns every ledger and pool (enforced by Rust ownership)
//! - Exposes behavior through methods, not public fields
//! - Reports rejected requests through outcome enums
//! - Records domain events in an outbox drained by the caller
//!
//! Exclusive `&mut` access to the aggregate is what rules out a second
//! mutation starting while one is still in progress.

pub mod character;
pub mod persisted;

pub use character::{BuildIdentity, Character, PendingAbilityChoice};
pub use persisted::{PersistedCharacter, PersistedFeatures, PersistedOptional, PersistedPool};
