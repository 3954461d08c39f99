//! Refund reconciliation.
//!
//! When a fixed (non-choice) source grants a skill that an optional choice from
//! a *different* origin already claimed, the choice is retracted and its slot
//! freed. Without this a later fixed grant would leave a phantom pick that
//! consumes capacity but adds nothing.

use crate::common::eq_for_lookup;
use crate::entities::{OptionalProficiencies, ProficiencyLedger};
use crate::value_objects::{Origin, ProficiencyType, SourceTag};

/// Retracts optional selections made redundant by a fixed grant.
pub struct RefundReconciler;

impl RefundReconciler {
    /// Whether a grant of `proficiency_type` from `source` is subject to refunds.
    ///
    /// Only fixed skill grants are: skills are the one type where optional
    /// selections routinely collide with later fixed grants.
    pub fn applies_to(proficiency_type: ProficiencyType, source: &SourceTag) -> bool {
        proficiency_type == ProficiencyType::Skills && !source.is_choice()
    }

    /// Scans every origin other than `new_source`'s nominal origin for a selection
    /// of `name`, retracts it from the pool and its choice tag from the ledger.
    ///
    /// Returns `(origin, stored spelling)` for every refund. Affected combined
    /// views are recombined before returning.
    pub fn reconcile(
        pools: &mut OptionalProficiencies,
        ledger: &mut ProficiencyLedger,
        proficiency_type: ProficiencyType,
        name: &str,
        new_source: &SourceTag,
    ) -> Vec<(Origin, String)> {
        let granting_origin = new_source.nominal_origin();
        let mut refunded = Vec::new();

        for origin in Origin::ALL {
            if Some(origin) == granting_origin {
                continue;
            }
            let pool = pools.pool_mut(proficiency_type, origin);
            let Some(stored) = pool
                .selected()
                .iter()
                .find(|s| eq_for_lookup(s, name))
                .cloned()
            else {
                continue;
            };

            pool.deselect(&stored);
            ledger.remove_source(proficiency_type, &stored, &origin.choice_tag());
            tracing::info!(
                proficiency_type = %proficiency_type,
                proficiency = %stored,
                origin = %origin,
                granted_by = %new_source,
                "Refunded optional selection made redundant by fixed grant"
            );
            refunded.push((origin, stored));
        }

        if !refunded.is_empty() {
            pools.recombine(proficiency_type);
        }
        refunded
    }
}
