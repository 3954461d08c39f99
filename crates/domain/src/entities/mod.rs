//! Ledgers and pools that make up a character's derived build state.

mod ability_bonus_ledger;
mod optional_pool;
mod proficiency_ledger;
mod refund;
mod trait_ledger;

pub use ability_bonus_ledger::{AbilityBonus, AbilityBonusLedger};
pub use optional_pool::{ChoicePool, CombinedPool, OptionalProficiencies, OptionalProficiency};
pub use proficiency_ledger::{ProficiencyGrant, ProficiencyLedger, SourceRemoval};
pub use refund::RefundReconciler;
pub use trait_ledger::{TraitEntry, TraitLedger};
