//! Value objects - immutable vocabulary types shared by every ledger.

mod ability;
pub mod catalog;
mod proficiency;
mod source_tag;

pub use ability::Ability;
pub use catalog::{any_options, canonical_name};
pub use proficiency::{Origin, ProficiencyType};
pub use source_tag::{BuildSourceKind, SourceTag};
