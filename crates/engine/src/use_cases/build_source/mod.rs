//! Build-source application.
//!
//! Every change to a race, class or background slot is a teardown of
//! everything the slot owns followed by an optional setup from new rule data.
//! Teardown always runs, so reapplying the same selection converges on the
//! same state instead of stacking grants.

mod derive;
mod overrides;

pub use derive::{derive, AbilityChoiceGrant, PoolGrant, SourceGrants};
pub use overrides::{OverrideEffect, RuleOverride, RACE_OVERRIDES};

use std::collections::BTreeMap;

use charbldr_domain::{
    BuildIdentity, BuildSourceKind, Character, PendingAbilityChoice, ProficiencyType, SourceTag,
};

use crate::infrastructure::ports::{ImportError, RuleData, RuleDataSource};

// =============================================================================
// Input / Result Types
// =============================================================================

/// A slot selection: race with optional subrace, class with optional
/// subclass, or a background.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSelection {
    pub rule: RuleData,
    pub sub: Option<RuleData>,
}

impl BuildSelection {
    pub fn new(rule: RuleData) -> Self {
        Self { rule, sub: None }
    }

    pub fn with_sub(mut self, sub: RuleData) -> Self {
        self.sub = Some(sub);
        self
    }
}

/// What one apply changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub kind: Option<BuildSourceKind>,
    pub tags_cleared: Vec<SourceTag>,
    pub proficiencies_removed: BTreeMap<ProficiencyType, Vec<String>>,
    pub ability_bonuses_added: usize,
    pub ability_choices_added: usize,
    pub traits_added: usize,
    pub proficiencies_granted: usize,
    pub pools_populated: Vec<ProficiencyType>,
    pub overrides_applied: Vec<&'static str>,
}

impl ApplyReport {
    fn new(kind: Option<BuildSourceKind>) -> Self {
        Self {
            kind,
            tags_cleared: Vec::new(),
            proficiencies_removed: BTreeMap::new(),
            ability_bonuses_added: 0,
            ability_choices_added: 0,
            traits_added: 0,
            proficiencies_granted: 0,
            pools_populated: Vec::new(),
            overrides_applied: Vec::new(),
        }
    }
}

// =============================================================================
// Applier
// =============================================================================

/// Applies rule data to a character's build-source slots.
#[derive(Debug, Clone, Copy)]
pub struct BuildSourceApplier {
    apply_overrides: bool,
}

impl Default for BuildSourceApplier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl BuildSourceApplier {
    pub fn new(apply_overrides: bool) -> Self {
        Self { apply_overrides }
    }

    /// Tears down `kind`'s slot, then sets it up from `selection` if given.
    /// A `None` selection leaves the slot cleared.
    pub fn apply(
        &self,
        character: &mut Character,
        kind: BuildSourceKind,
        selection: Option<&BuildSelection>,
    ) -> ApplyReport {
        let mut report = ApplyReport::new(Some(kind));
        self.teardown(character, kind, &mut report);

        if let Some(selection) = selection {
            self.setup(character, kind, selection, &mut report);
        }

        tracing::info!(
            kind = %kind,
            selection = selection.map(|s| s.rule.name.as_str()).unwrap_or("<none>"),
            bonuses = report.ability_bonuses_added,
            traits = report.traits_added,
            grants = report.proficiencies_granted,
            pools = report.pools_populated.len(),
            overrides = ?report.overrides_applied,
            "Build source applied"
        );
        report
    }

    fn teardown(&self, character: &mut Character, kind: BuildSourceKind, report: &mut ApplyReport) {
        for tag in kind.owned_tags() {
            Self::clear_tag(character, &tag, report);
        }
        character.clear_ability_bonuses_by_prefix(kind.choice_tag().as_str());
        character.reset_optional_pools(kind.origin());

        match kind {
            BuildSourceKind::Race => character.reset_physical_traits(),
            BuildSourceKind::Class => character.set_hit_die(None),
            BuildSourceKind::Background => {}
        }
        character.clear_identity(kind);
    }

    /// Removes every ledger entry carrying `tag` or one of its choice tags.
    fn clear_tag(character: &mut Character, tag: &SourceTag, report: &mut ApplyReport) {
        character.clear_ability_bonuses(tag.as_str());
        character.clear_pending_ability_choices(tag);
        character.clear_traits(tag.as_str());
        character.clear_resistances(tag.as_str());

        for (proficiency_type, names) in character.remove_proficiencies_by_source(tag.as_str()) {
            report
                .proficiencies_removed
                .entry(proficiency_type)
                .or_default()
                .extend(names);
        }
        report.tags_cleared.push(tag.clone());
    }

    fn setup(
        &self,
        character: &mut Character,
        kind: BuildSourceKind,
        selection: &BuildSelection,
        report: &mut ApplyReport,
    ) {
        let sub = match (&selection.sub, kind.sub_tag()) {
            (Some(sub), Some(sub_tag)) => Some((sub, sub_tag)),
            (Some(sub), None) => {
                tracing::warn!(
                    kind = %kind,
                    sub = %sub.name,
                    "Ignoring sub-selection for a slot without one"
                );
                None
            }
            (None, _) => None,
        };

        let base = match &sub {
            Some((sub, _)) => without_overwritten(&selection.rule, sub),
            None => selection.rule.clone(),
        };
        let mut grants = derive(&base);
        self.grant(character, &grants, &kind.tag(), report);

        if let Some((sub, sub_tag)) = &sub {
            let sub_grants = derive(sub);
            self.grant(character, &sub_grants, sub_tag, report);
            grants.merge_pools(&sub_grants);
            grants.speed = sub_grants.speed.or(grants.speed);
            grants.size = sub_grants.size.or(grants.size);
            grants.darkvision = sub_grants.darkvision.or(grants.darkvision);
        }

        for (proficiency_type, pool) in grants.pools {
            character.set_optional_pool(
                proficiency_type,
                kind.origin(),
                pool.allowed,
                pool.options,
            );
            report.pools_populated.push(proficiency_type);
        }

        match kind {
            BuildSourceKind::Race => {
                if let Some(size) = grants.size {
                    character.set_size(size);
                }
                if let Some(speed) = grants.speed {
                    character.set_speed(speed);
                }
                if let Some(darkvision) = grants.darkvision {
                    character.set_darkvision(darkvision);
                }
            }
            BuildSourceKind::Class => character.set_hit_die(grants.hit_die),
            BuildSourceKind::Background => {}
        }

        if self.apply_overrides && kind == BuildSourceKind::Race {
            report.overrides_applied =
                overrides::apply_race_overrides(character, &selection.rule, selection.sub.as_ref());
        }

        let mut identity = BuildIdentity::new(&selection.rule.name, &selection.rule.source);
        if let Some((sub, _)) = &sub {
            identity = identity.with_sub(&sub.name);
        }
        character.set_identity(kind, identity);
    }

    /// Adds bonuses, pending choices, traits, resistances and fixed
    /// proficiencies under `tag`. Pools and scalars are left to the caller.
    fn grant(
        &self,
        character: &mut Character,
        grants: &SourceGrants,
        tag: &SourceTag,
        report: &mut ApplyReport,
    ) {
        for (ability, value) in &grants.ability_bonuses {
            if character.add_ability_bonus(ability.as_str(), *value, tag) {
                report.ability_bonuses_added += 1;
            }
        }
        for choice in &grants.ability_choices {
            character.add_pending_ability_choice(PendingAbilityChoice::new(
                choice.count,
                choice.amount,
                choice.from.clone(),
                tag.clone(),
            ));
            report.ability_choices_added += 1;
        }
        for (name, description) in &grants.traits {
            character.add_trait(name, description.as_str(), tag);
            report.traits_added += 1;
        }
        for damage_type in &grants.resistances {
            character.add_resistance(damage_type, tag);
        }
        for (proficiency_type, name) in &grants.proficiencies {
            character.add_proficiency(*proficiency_type, name, tag);
            report.proficiencies_granted += 1;
        }
    }

    // =========================================================================
    // Feats
    // =========================================================================

    /// Grants `feat` under `"<Kind>-linked"`, replacing whatever feat the slot
    /// held before. It goes away with the slot.
    pub fn apply_linked_feat(
        &self,
        character: &mut Character,
        kind: BuildSourceKind,
        feat: &RuleData,
    ) -> ApplyReport {
        let mut report = ApplyReport::new(Some(kind));
        let tag = kind.linked_tag();
        Self::clear_tag(character, &tag, &mut report);
        self.grant_feat(character, feat, &tag, &mut report);
        tracing::info!(kind = %kind, feat = %feat.name, "Linked feat applied");
        report
    }

    /// Grants `feat` under `"Feat: <name>"`, replacing an earlier application
    /// of the same feat.
    pub fn apply_feat(&self, character: &mut Character, feat: &RuleData) -> ApplyReport {
        let mut report = ApplyReport::new(None);
        let name = character
            .recorded_feat(&feat.name)
            .unwrap_or(feat.name.as_str());
        let tag = SourceTag::feat(name);
        Self::clear_tag(character, &tag, &mut report);
        self.grant_feat(character, feat, &tag, &mut report);
        character.record_feat(&feat.name);
        tracing::info!(feat = %feat.name, "Feat applied");
        report
    }

    /// Removes everything a standalone feat granted.
    pub fn remove_feat(&self, character: &mut Character, name: &str) -> ApplyReport {
        let mut report = ApplyReport::new(None);
        let tag = SourceTag::feat(character.recorded_feat(name).unwrap_or(name));
        Self::clear_tag(character, &tag, &mut report);
        if !character.forget_feat(name) {
            tracing::warn!(feat = %name, "Removed a feat that was not recorded");
        }
        report
    }

    fn grant_feat(
        &self,
        character: &mut Character,
        feat: &RuleData,
        tag: &SourceTag,
        report: &mut ApplyReport,
    ) {
        let mut grants = derive(feat);
        if !grants.pools.is_empty() {
            tracing::warn!(
                feat = %feat.name,
                types = ?grants.pools.keys().collect::<Vec<_>>(),
                "Feat proficiency choices are not supported; skipping them"
            );
        }
        if grants.traits.is_empty() {
            let mut lines = Vec::new();
            for entry in &feat.entries {
                derive::flatten_text(entry, &mut lines);
            }
            if !lines.is_empty() {
                grants.traits.push((feat.name.clone(), lines.join("\n")));
            }
        }
        self.grant(character, &grants, tag, report);
    }
}

/// Copy of `base` without the fields `sub` replaces.
fn without_overwritten(base: &RuleData, sub: &RuleData) -> RuleData {
    let mut base = base.clone();
    if sub.overwrites("ability") {
        base.ability.clear();
    }
    if sub.overwrites("skillProficiencies") {
        base.skill_proficiencies.clear();
    }
    if sub.overwrites("languageProficiencies") {
        base.language_proficiencies.clear();
    }
    if sub.overwrites("toolProficiencies") {
        base.tool_proficiencies.clear();
    }
    base
}

// =============================================================================
// Loading
// =============================================================================

/// Looks up a slot selection by name, with an optional sub-selection.
pub async fn load_selection(
    data: &dyn RuleDataSource,
    kind: BuildSourceKind,
    name: &str,
    sub: Option<&str>,
) -> Result<BuildSelection, ImportError> {
    let selection = match kind {
        BuildSourceKind::Race => {
            let race = data.find_race(name, None).await?;
            let subrace = match sub {
                Some(sub) => Some(data.find_subrace(&race, sub).await?),
                None => None,
            };
            BuildSelection { rule: race, sub: subrace }
        }
        BuildSourceKind::Class => {
            let class = data.find_class(name, None).await?;
            let subclass = match sub {
                Some(sub) => Some(data.find_subclass(&class, sub).await?),
                None => None,
            };
            BuildSelection { rule: class, sub: subclass }
        }
        BuildSourceKind::Background => BuildSelection::new(data.find_background(name, None).await?),
    };
    Ok(selection)
}
