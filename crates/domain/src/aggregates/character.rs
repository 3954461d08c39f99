//! Character aggregate - the build state of one character-creation session
//!
//! # Rustic DDD Design
//!
//! - **Private fields**: ledgers are only reachable through the mutation API,
//!   so every grant passes through the same validation, refund and event path
//! - **Outcome enums**: rejected requests return `SelectionOutcome` /
//!   `AbilityChoiceOutcome` instead of errors
//! - **Outbox**: mutations push [`BuildEvent`]s that the caller drains with
//!   [`Character::take_events`] once the whole operation has completed
//!
//! # Invariants
//!
//! - For every proficiency type and origin, `selected.len() <= allowed` and
//!   `selected ⊆ options`
//! - A proficiency is granted iff at least one source tag grants it
//! - Every optional selection is backed by its origin's choice tag in the
//!   proficiency ledger

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::common::normalize_for_lookup;
use crate::entities::{
    AbilityBonusLedger, ChoicePool, CombinedPool, OptionalProficiencies, ProficiencyGrant,
    ProficiencyLedger, RefundReconciler, TraitEntry, TraitLedger,
};
use crate::events::{AbilityChoiceOutcome, BuildEvent, SelectionOutcome};
use crate::value_objects::{Ability, BuildSourceKind, Origin, ProficiencyType, SourceTag};
use crate::CharacterId;

pub const DEFAULT_ABILITY_SCORE: i32 = 10;
pub const DEFAULT_SIZE: &str = "Medium";
pub const DEFAULT_SPEED: u32 = 30;

/// The rule content currently applied to one build-source slot.
///
/// An empty `name` means the slot is unselected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIdentity {
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl BuildIdentity {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            sub: None,
        }
    }

    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn is_set(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// An unresolved "choose N abilities to increase" grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAbilityChoice {
    pub count: u32,
    pub amount: i32,
    pub from: Vec<Ability>,
    pub source: SourceTag,
    #[serde(default)]
    pub selected: Vec<Ability>,
}

impl PendingAbilityChoice {
    /// A choice over `from`; an empty `from` means all six abilities.
    pub fn new(count: u32, amount: i32, from: Vec<Ability>, source: SourceTag) -> Self {
        let from = if from.is_empty() {
            Ability::ALL.to_vec()
        } else {
            from
        };
        Self {
            count,
            amount,
            from,
            source,
            selected: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.selected.is_empty()
    }
}

/// A character under construction.
///
/// # Example
///
/// ```
/// use charbldr_domain::aggregates::Character;
/// use charbldr_domain::value_objects::{Origin, ProficiencyType, SourceTag};
///
/// let mut character = Character::new();
/// assert!(character.has_proficiency(ProficiencyType::Languages, "common"));
///
/// character.set_optional_pool(
///     ProficiencyType::Skills,
///     Origin::Race,
///     1,
///     vec!["Stealth".to_string(), "Athletics".to_string()],
/// );
/// assert!(character
///     .select_optional_proficiency(ProficiencyType::Skills, Origin::Race, "Stealth")
///     .is_selected());
/// assert!(!character
///     .select_optional_proficiency(ProficiencyType::Skills, Origin::Race, "Athletics")
///     .is_selected());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    id: CharacterId,
    allowed_sources: Vec<String>,

    // Abilities
    ability_scores: BTreeMap<Ability, i32>,
    ability_bonuses: AbilityBonusLedger,
    pending_ability_choices: Vec<PendingAbilityChoice>,

    // Proficiencies
    proficiencies: ProficiencyLedger,
    optional_proficiencies: OptionalProficiencies,

    // Features
    darkvision: u32,
    resistances: BTreeMap<String, BTreeSet<SourceTag>>,
    traits: TraitLedger,

    // Scalars
    size: String,
    speed: u32,
    hit_die: Option<u32>,

    // Applied build sources
    race: BuildIdentity,
    class: BuildIdentity,
    background: BuildIdentity,
    feats: Vec<String>,

    events: Vec<BuildEvent>,
}

impl Default for Character {
    fn default() -> Self {
        Self::new()
    }
}

impl Character {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// A fresh character knowing Common, allowed to use PHB content.
    pub fn new() -> Self {
        Self::with_defaults(&["Common"], &["PHB"])
    }

    /// A fresh character granting `languages` with the `Default` tag.
    pub fn with_defaults<L, S>(languages: &[L], allowed_sources: &[S]) -> Self
    where
        L: AsRef<str>,
        S: AsRef<str>,
    {
        let mut character = Self::empty(CharacterId::new());
        character.allowed_sources = allowed_sources
            .iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let default_tag = SourceTag::default_grant();
        for language in languages {
            character.add_proficiency(ProficiencyType::Languages, language.as_ref(), &default_tag);
        }
        character.events.clear();
        character
    }

    /// Bare state with no defaults granted; used by construction and restore.
    pub(crate) fn empty(id: CharacterId) -> Self {
        Self {
            id,
            allowed_sources: Vec::new(),
            ability_scores: Ability::ALL
                .into_iter()
                .map(|a| (a, DEFAULT_ABILITY_SCORE))
                .collect(),
            ability_bonuses: AbilityBonusLedger::new(),
            pending_ability_choices: Vec::new(),
            proficiencies: ProficiencyLedger::new(),
            optional_proficiencies: OptionalProficiencies::new(),
            darkvision: 0,
            resistances: BTreeMap::new(),
            traits: TraitLedger::new(),
            size: DEFAULT_SIZE.to_string(),
            speed: DEFAULT_SPEED,
            hit_die: None,
            race: BuildIdentity::default(),
            class: BuildIdentity::default(),
            background: BuildIdentity::default(),
            feats: Vec::new(),
            events: Vec::new(),
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    pub fn id(&self) -> CharacterId {
        self.id
    }

    pub fn allowed_sources(&self) -> &[String] {
        &self.allowed_sources
    }

    pub fn identity(&self, kind: BuildSourceKind) -> &BuildIdentity {
        match kind {
            BuildSourceKind::Race => &self.race,
            BuildSourceKind::Class => &self.class,
            BuildSourceKind::Background => &self.background,
        }
    }

    pub fn set_identity(&mut self, kind: BuildSourceKind, identity: BuildIdentity) {
        *self.identity_mut(kind) = identity;
    }

    pub fn clear_identity(&mut self, kind: BuildSourceKind) {
        *self.identity_mut(kind) = BuildIdentity::default();
    }

    fn identity_mut(&mut self, kind: BuildSourceKind) -> &mut BuildIdentity {
        match kind {
            BuildSourceKind::Race => &mut self.race,
            BuildSourceKind::Class => &mut self.class,
            BuildSourceKind::Background => &mut self.background,
        }
    }

    /// Standalone feats, in the order applied.
    pub fn feats(&self) -> &[String] {
        &self.feats
    }

    pub fn record_feat(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && !self.has_feat(name) {
            self.feats.push(name.to_string());
        }
    }

    /// Forgets a standalone feat. Returns `false` if it was not recorded.
    pub fn forget_feat(&mut self, name: &str) -> bool {
        let key = normalize_for_lookup(name);
        let before = self.feats.len();
        self.feats.retain(|f| normalize_for_lookup(f) != key);
        self.feats.len() != before
    }

    pub fn has_feat(&self, name: &str) -> bool {
        self.recorded_feat(name).is_some()
    }

    /// The spelling `name` was recorded under, matched case-insensitively.
    pub fn recorded_feat(&self, name: &str) -> Option<&str> {
        let key = normalize_for_lookup(name);
        self.feats
            .iter()
            .find(|f| normalize_for_lookup(f) == key)
            .map(String::as_str)
    }

    // =========================================================================
    // Ability scores & bonuses
    // =========================================================================

    pub fn ability_score(&self, ability: Ability) -> i32 {
        self.ability_scores
            .get(&ability)
            .copied()
            .unwrap_or(DEFAULT_ABILITY_SCORE)
    }

    pub fn set_ability_score(&mut self, ability: Ability, score: i32) {
        self.ability_scores.insert(ability, score);
    }

    /// Base score plus every bonus.
    pub fn ability_total(&self, ability: Ability) -> i32 {
        self.ability_score(ability) + self.ability_bonuses.total(ability)
    }

    pub fn ability_modifier(&self, ability: Ability) -> i32 {
        Ability::modifier(self.ability_total(ability))
    }

    pub fn ability_bonuses(&self) -> &AbilityBonusLedger {
        &self.ability_bonuses
    }

    /// Adds or replaces the bonus `source` gives to `ability` (raw key, e.g. `"str"`).
    pub fn add_ability_bonus(&mut self, ability: &str, value: i32, source: &SourceTag) -> bool {
        self.ability_bonuses.add(ability, value, source)
    }

    pub fn clear_ability_bonuses(&mut self, source: &str) -> usize {
        self.ability_bonuses.clear_by_source(source)
    }

    pub fn clear_ability_bonuses_by_prefix(&mut self, prefix: &str) -> usize {
        self.ability_bonuses.clear_by_source_prefix(prefix)
    }

    pub fn pending_ability_choices(&self) -> &[PendingAbilityChoice] {
        &self.pending_ability_choices
    }

    pub fn add_pending_ability_choice(&mut self, choice: PendingAbilityChoice) {
        if choice.count == 0 || choice.source.is_empty() {
            tracing::warn!(
                source = %choice.source,
                count = choice.count,
                "Ignoring empty ability choice"
            );
            return;
        }
        self.pending_ability_choices.push(choice);
    }

    /// Drops every pending choice from `source` together with the bonuses its
    /// resolutions granted. Returns the number of choices dropped.
    pub fn clear_pending_ability_choices(&mut self, source: &SourceTag) -> usize {
        let before = self.pending_ability_choices.len();
        self.pending_ability_choices.retain(|c| &c.source != source);
        self.ability_bonuses
            .clear_by_source_prefix(&format!("{} Choice", source));
        before - self.pending_ability_choices.len()
    }

    /// Resolves the pending choice at `index` with `picks`.
    ///
    /// Previous picks for the same choice are retracted first, so resolving
    /// again replaces rather than stacks.
    pub fn resolve_ability_choice(
        &mut self,
        index: usize,
        picks: &[Ability],
    ) -> AbilityChoiceOutcome {
        let Some(choice) = self.pending_ability_choices.get(index) else {
            return AbilityChoiceOutcome::NoSuchChoice { index };
        };
        if picks.len() != choice.count as usize {
            return AbilityChoiceOutcome::WrongCount {
                expected: choice.count,
                got: picks.len(),
            };
        }
        let mut seen = BTreeSet::new();
        for &ability in picks {
            if !choice.from.contains(&ability) {
                return AbilityChoiceOutcome::NotAllowed { ability };
            }
            if !seen.insert(ability) {
                return AbilityChoiceOutcome::Duplicate { ability };
            }
        }

        let tag = self.ability_choice_tag(index);
        let amount = choice.amount;
        self.ability_bonuses.clear_by_source(tag.as_str());
        for &ability in picks {
            self.ability_bonuses.add_bonus(ability, amount, &tag);
        }
        if let Some(choice) = self.pending_ability_choices.get_mut(index) {
            choice.selected = picks.to_vec();
        }

        tracing::debug!(source = %tag, picks = ?picks, "Ability choice resolved");
        AbilityChoiceOutcome::Resolved {
            source: tag.to_string(),
            picks: picks.to_vec(),
        }
    }

    /// `"<source> Choice <n>"`, numbering choices from the same source from 1.
    fn ability_choice_tag(&self, index: usize) -> SourceTag {
        let source = &self.pending_ability_choices[index].source;
        let ordinal = self.pending_ability_choices[..index]
            .iter()
            .filter(|c| &c.source == source)
            .count()
            + 1;
        SourceTag::new(format!("{} Choice {}", source, ordinal))
    }

    // =========================================================================
    // Proficiencies
    // =========================================================================

    /// Grants `name` from `source`. Fixed skill grants refund redundant
    /// selections from other origins. Returns whether the name was new.
    pub fn add_proficiency(
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

        let was_new = self.proficiencies.add(proficiency_type, name, source);
        self.events.push(BuildEvent::ProficiencyAdded {
            proficiency_type,
            proficiency: name.to_string(),
            source: source.clone(),
            was_new,
        });

        if RefundReconciler::applies_to(proficiency_type, source) {
            let refunded = RefundReconciler::reconcile(
                &mut self.optional_proficiencies,
                &mut self.proficiencies,
                proficiency_type,
                name,
                source,
            );
            for (origin, proficiency) in refunded {
                self.events.push(BuildEvent::ProficiencyRefunded {
                    proficiency_type,
                    proficiency,
                    origin,
                });
            }
        }
        was_new
    }

    /// Strips `source` and its choice tags from every proficiency, then drops
    /// pool selections that lost their backing choice tag.
    pub fn remove_proficiencies_by_source(
        &mut self,
        source: &str,
    ) -> BTreeMap<ProficiencyType, Vec<String>> {
        let removed = self.proficiencies.remove_by_source(source);
        if removed.is_empty() {
            return removed;
        }
        self.retain_backed_selections();
        self.events.push(BuildEvent::ProficienciesRemovedBySource {
            source: SourceTag::new(source),
            removed: removed.clone(),
        });
        removed
    }

    fn retain_backed_selections(&mut self) {
        for proficiency_type in ProficiencyType::ALL {
            for origin in Origin::ALL {
                let tag = origin.choice_tag();
                let unbacked: Vec<String> = self
                    .optional_proficiencies
                    .pool(proficiency_type, origin)
                    .selected()
                    .iter()
                    .filter(|name| {
                        !self
                            .proficiencies
                            .grant(proficiency_type, name)
                            .is_some_and(|g| g.sources().contains(&tag))
                    })
                    .cloned()
                    .collect();
                for name in unbacked {
                    self.optional_proficiencies
                        .pool_mut(proficiency_type, origin)
                        .deselect(&name);
                    self.events.push(BuildEvent::OptionalDeselected {
                        proficiency_type,
                        origin,
                        proficiency: name,
                    });
                }
            }
        }
        self.optional_proficiencies.recombine_all();
    }

    pub fn has_proficiency(&self, proficiency_type: ProficiencyType, name: &str) -> bool {
        self.proficiencies.has(proficiency_type, name)
    }

    pub fn is_granted_by_fixed_source(
        &self,
        proficiency_type: ProficiencyType,
        name: &str,
    ) -> bool {
        self.proficiencies.is_granted_by_fixed_source(proficiency_type, name)
    }

    /// A name may be chosen (or kept chosen) unless a fixed source already grants it.
    pub fn is_proficiency_available_for_selection(
        &self,
        proficiency_type: ProficiencyType,
        name: &str,
    ) -> bool {
        !name.trim().is_empty() && !self.is_granted_by_fixed_source(proficiency_type, name)
    }

    /// Granted names of one type mapped to the tags granting them.
    pub fn proficiencies_with_sources(
        &self,
        proficiency_type: ProficiencyType,
    ) -> BTreeMap<String, BTreeSet<SourceTag>> {
        self.proficiencies
            .grants(proficiency_type)
            .map(|g| (g.name().to_string(), g.sources().clone()))
            .collect()
    }

    pub fn proficiency_grants(
        &self,
        proficiency_type: ProficiencyType,
    ) -> impl Iterator<Item = &ProficiencyGrant> {
        self.proficiencies.grants(proficiency_type)
    }

    pub fn proficiency_ledger(&self) -> &ProficiencyLedger {
        &self.proficiencies
    }

    // =========================================================================
    // Optional choice pools
    // =========================================================================

    pub fn combined_optional_pool(&self, proficiency_type: ProficiencyType) -> &CombinedPool {
        self.optional_proficiencies.combined(proficiency_type)
    }

    pub fn optional_pool(&self, proficiency_type: ProficiencyType, origin: Origin) -> &ChoicePool {
        self.optional_proficiencies.pool(proficiency_type, origin)
    }

    pub fn optional_proficiencies(&self) -> &OptionalProficiencies {
        &self.optional_proficiencies
    }

    /// Replaces one pool's allowance and options. Selections that no longer fit
    /// are deselected and their choice tags retracted; they are returned.
    pub fn set_optional_pool(
        &mut self,
        proficiency_type: ProficiencyType,
        origin: Origin,
        allowed: u32,
        options: Vec<String>,
    ) -> Vec<String> {
        let dropped = self
            .optional_proficiencies
            .pool_mut(proficiency_type, origin)
            .set(allowed, options);
        self.retract_selections(proficiency_type, origin, &dropped);
        self.optional_proficiencies.recombine(proficiency_type);
        dropped
    }

    /// Zeroes `origin`'s pool for every type, retracting all its selections.
    pub fn reset_optional_pools(&mut self, origin: Origin) {
        for proficiency_type in ProficiencyType::ALL {
            let dropped = self
                .optional_proficiencies
                .pool_mut(proficiency_type, origin)
                .reset();
            self.retract_selections(proficiency_type, origin, &dropped);
        }
        self.optional_proficiencies.recombine_all();
    }

    fn retract_selections(
        &mut self,
        proficiency_type: ProficiencyType,
        origin: Origin,
        names: &[String],
    ) {
        let tag = origin.choice_tag();
        for name in names {
            self.proficiencies.remove_source(proficiency_type, name, &tag);
            self.events.push(BuildEvent::OptionalDeselected {
                proficiency_type,
                origin,
                proficiency: name.clone(),
            });
        }
    }

    pub fn select_optional_proficiency(
        &mut self,
        proficiency_type: ProficiencyType,
        origin: Origin,
        name: &str,
    ) -> SelectionOutcome {
        if self.is_granted_by_fixed_source(proficiency_type, name) {
            tracing::warn!(
                proficiency_type = %proficiency_type,
                origin = %origin,
                name = %name,
                "Rejected optional selection already granted by a fixed source"
            );
            return SelectionOutcome::AlreadyGranted;
        }

        let stored = match self
            .optional_proficiencies
            .pool_mut(proficiency_type, origin)
            .select(name)
        {
            Ok(stored) => stored,
            Err(outcome) => {
                tracing::warn!(
                    proficiency_type = %proficiency_type,
                    origin = %origin,
                    name = %name,
                    outcome = ?outcome,
                    "Rejected optional selection"
                );
                return outcome;
            }
        };

        let tag = origin.choice_tag();
        let was_new = self.proficiencies.add(proficiency_type, &stored, &tag);
        self.optional_proficiencies.recombine(proficiency_type);
        debug_assert!({
            let pool = self.optional_proficiencies.pool(proficiency_type, origin);
            pool.selected().len() <= pool.allowed() as usize
        });

        self.events.push(BuildEvent::ProficiencyAdded {
            proficiency_type,
            proficiency: stored.clone(),
            source: tag,
            was_new,
        });
        self.events.push(BuildEvent::OptionalSelected {
            proficiency_type,
            origin,
            proficiency: stored,
        });
        SelectionOutcome::Selected
    }

    /// Removes a selection and exactly its origin's choice tag. Returns `false`
    /// if `name` was not selected in that pool.
    pub fn deselect_optional_proficiency(
        &mut self,
        proficiency_type: ProficiencyType,
        origin: Origin,
        name: &str,
    ) -> bool {
        let Some(stored) = self
            .optional_proficiencies
            .pool_mut(proficiency_type, origin)
            .deselect(name)
        else {
            tracing::warn!(
                proficiency_type = %proficiency_type,
                origin = %origin,
                name = %name,
                "Cannot deselect a proficiency that is not selected"
            );
            return false;
        };

        self.retract_selections(proficiency_type, origin, std::slice::from_ref(&stored));
        self.optional_proficiencies.recombine(proficiency_type);
        true
    }

    // =========================================================================
    // Features
    // =========================================================================

    pub fn traits(&self) -> &TraitLedger {
        &self.traits
    }

    pub fn add_trait(
        &mut self,
        name: &str,
        description: impl Into<String>,
        source: &SourceTag,
    ) -> Option<TraitEntry> {
        self.traits.add(name, description, source)
    }

    pub fn clear_traits(&mut self, source: &str) -> usize {
        self.traits.clear_by_source(source)
    }

    pub fn darkvision(&self) -> u32 {
        self.darkvision
    }

    pub fn set_darkvision(&mut self, range: u32) {
        self.darkvision = range;
    }

    /// Damage types resisted, lowercased, in name order.
    pub fn resistances(&self) -> impl Iterator<Item = &str> {
        self.resistances.keys().map(String::as_str)
    }

    pub fn resistance_sources(&self) -> &BTreeMap<String, BTreeSet<SourceTag>> {
        &self.resistances
    }

    pub fn add_resistance(&mut self, damage_type: &str, source: &SourceTag) -> bool {
        let key = normalize_for_lookup(damage_type);
        if key.is_empty() || source.is_empty() {
            tracing::warn!(
                damage_type = %damage_type,
                source = %source,
                "Ignoring empty resistance"
            );
            return false;
        }
        self.resistances.entry(key).or_default().insert(source.clone())
    }

    pub fn clear_resistances(&mut self, source: &str) -> usize {
        let mut removed = 0;
        for tags in self.resistances.values_mut() {
            let before = tags.len();
            tags.retain(|t| t.as_str() != source);
            removed += before - tags.len();
        }
        self.resistances.retain(|_, tags| !tags.is_empty());
        removed
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn set_size(&mut self, size: impl Into<String>) {
        self.size = size.into();
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.speed = speed;
    }

    pub fn hit_die(&self) -> Option<u32> {
        self.hit_die
    }

    pub fn set_hit_die(&mut self, faces: Option<u32>) {
        self.hit_die = faces;
    }

    /// First-level hit points: hit die plus Constitution modifier, at least 1.
    pub fn max_hit_points(&self) -> Option<i32> {
        self.hit_die
            .map(|faces| (faces as i32 + self.ability_modifier(Ability::Constitution)).max(1))
    }

    /// Restores race-owned scalars to their defaults.
    pub fn reset_physical_traits(&mut self) {
        self.size = DEFAULT_SIZE.to_string();
        self.speed = DEFAULT_SPEED;
        self.darkvision = 0;
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Queues a coarse refresh signal for observers.
    pub fn mark_updated(&mut self, kind: Option<BuildSourceKind>) {
        self.events.push(BuildEvent::CharacterUpdated { kind });
    }

    /// Drains the outbox in emission order.
    pub fn take_events(&mut self) -> Vec<BuildEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    // =========================================================================
    // Restore (used by the persisted form)
    // =========================================================================

    pub(crate) fn restore_parts(&mut self) -> RestoreParts<'_> {
        RestoreParts { character: self }
    }
}

/// Raw write access used only while rebuilding from the persisted form.
pub(crate) struct RestoreParts<'a> {
    character: &'a mut Character,
}

impl RestoreParts<'_> {
    pub(crate) fn allowed_sources(&mut self, sources: Vec<String>) {
        self.character.allowed_sources = sources;
    }

    pub(crate) fn pending_ability_choices(&mut self, choices: Vec<PendingAbilityChoice>) {
        self.character.pending_ability_choices = choices;
    }

    pub(crate) fn grant(
        &mut self,
        proficiency_type: ProficiencyType,
        name: &str,
        source: &SourceTag,
    ) {
        self.character.proficiencies.add(proficiency_type, name, source);
    }

    pub(crate) fn pool(
        &mut self,
        proficiency_type: ProficiencyType,
        origin: Origin,
        pool: ChoicePool,
    ) {
        *self
            .character
            .optional_proficiencies
            .pool_mut(proficiency_type, origin) = pool;
    }

    pub(crate) fn recombine(&mut self) {
        self.character.optional_proficiencies.recombine_all();
    }

    pub(crate) fn resistances(&mut self, resistances: BTreeMap<String, BTreeSet<SourceTag>>) {
        self.character.resistances = resistances
            .into_iter()
            .map(|(k, v)| (normalize_for_lookup(&k), v))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
    }

    pub(crate) fn feats(&mut self, feats: Vec<String>) {
        self.character.feats = feats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKILLS: ProficiencyType = ProficiencyType::Skills;

    fn tag(s: &str) -> SourceTag {
        SourceTag::new(s)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    mod construction {
        use super::*;

        #[test]
        fn new_character_knows_common_and_allows_phb() {
            let character = Character::new();
            assert!(character.has_proficiency(ProficiencyType::Languages, "Common"));
            assert_eq!(character.allowed_sources(), &["PHB".to_string()]);
            assert_eq!(character.ability_score(Ability::Strength), 10);
            assert_eq!(character.speed(), 30);
            assert_eq!(character.size(), "Medium");
            assert_eq!(character.pending_event_count(), 0);
        }

        #[test]
        fn with_defaults_uses_configured_languages() {
            let character = Character::with_defaults(&["Common", "Elvish"], &["PHB", "XGE"]);
            let languages = character.proficiencies_with_sources(ProficiencyType::Languages);
            assert_eq!(languages.len(), 2);
            assert!(languages["Elvish"].contains(&SourceTag::default_grant()));
            assert_eq!(character.allowed_sources().len(), 2);
        }
    }

    mod selection {
        use super::*;

        #[test]
        fn capacity_is_enforced() {
            let mut character = Character::new();
            character.set_optional_pool(SKILLS, Origin::Race, 1, names(&["Stealth", "Athletics"]));

            assert_eq!(
                character.select_optional_proficiency(SKILLS, Origin::Race, "Stealth"),
                SelectionOutcome::Selected
            );
            assert_eq!(
                character.select_optional_proficiency(SKILLS, Origin::Race, "Athletics"),
                SelectionOutcome::CapacityExhausted { allowed: 1 }
            );
            let pool = character.optional_pool(SKILLS, Origin::Race);
            assert_eq!(pool.selected(), &names(&["Stealth"]));
            assert!(character.has_proficiency(SKILLS, "stealth"));
            assert!(!character.has_proficiency(SKILLS, "Athletics"));
        }

        #[test]
        fn deselect_removes_only_that_origins_tag() {
            let mut character = Character::new();
            character.set_optional_pool(SKILLS, Origin::Race, 1, names(&["Perception"]));
            character.set_optional_pool(SKILLS, Origin::Class, 1, names(&["Perception"]));
            character.select_optional_proficiency(SKILLS, Origin::Race, "Perception");
            character.select_optional_proficiency(SKILLS, Origin::Class, "Perception");

            assert!(character.deselect_optional_proficiency(SKILLS, Origin::Race, "perception"));
            assert!(character.has_proficiency(SKILLS, "Perception"));
            let sources = &character.proficiencies_with_sources(SKILLS)["Perception"];
            assert_eq!(sources.iter().collect::<Vec<_>>(), vec![&tag("Class Choice")]);

            assert!(!character.deselect_optional_proficiency(SKILLS, Origin::Race, "Perception"));
        }

        #[test]
        fn fixed_grants_cannot_be_chosen() {
            let mut character = Character::new();
            character.set_optional_pool(
                ProficiencyType::Languages,
                Origin::Background,
                1,
                names(&["Common", "Elvish"]),
            );
            assert!(!character.is_proficiency_available_for_selection(
                ProficiencyType::Languages,
                "common"
            ));
            assert_eq!(
                character.select_optional_proficiency(
                    ProficiencyType::Languages,
                    Origin::Background,
                    "Common"
                ),
                SelectionOutcome::AlreadyGranted
            );
        }

        #[test]
        fn shrinking_a_pool_retracts_dropped_selections() {
            let mut character = Character::new();
            character.set_optional_pool(SKILLS, Origin::Class, 2, names(&["Arcana", "History"]));
            character.select_optional_proficiency(SKILLS, Origin::Class, "Arcana");
            character.select_optional_proficiency(SKILLS, Origin::Class, "History");

            let dropped = character.set_optional_pool(SKILLS, Origin::Class, 2, names(&["Arcana"]));
            assert_eq!(dropped, names(&["History"]));
            assert!(!character.has_proficiency(SKILLS, "History"));
            assert_eq!(character.combined_optional_pool(SKILLS).selected, names(&["Arcana"]));
        }

        #[test]
        fn selection_emits_added_and_selected_events() {
            let mut character = Character::new();
            character.set_optional_pool(SKILLS, Origin::Race, 1, names(&["Stealth"]));
            character.take_events();

            character.select_optional_proficiency(SKILLS, Origin::Race, "Stealth");
            let events = character.take_events();
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].event_type(), "proficiencyAdded");
            assert_eq!(events[1].event_type(), "optionalSelected");
        }
    }

    mod refund {
        use super::*;

        #[test]
        fn later_fixed_grant_refunds_race_choice() {
            let mut character = Character::new();
            character.set_optional_pool(SKILLS, Origin::Race, 1, names(&["Stealth", "Athletics"]));
            character.select_optional_proficiency(SKILLS, Origin::Race, "Stealth");
            assert_eq!(character.optional_pool(SKILLS, Origin::Race).remaining(), 0);
            character.take_events();

            character.add_proficiency(SKILLS, "Stealth", &tag("Class"));

            assert!(character.has_proficiency(SKILLS, "Stealth"));
            let pool = character.optional_pool(SKILLS, Origin::Race);
            assert!(pool.selected().is_empty());
            assert_eq!(pool.remaining(), 1);
            let events = character.take_events();
            assert!(events.iter().any(|e| matches!(
                e,
                BuildEvent::ProficiencyRefunded { origin: Origin::Race, .. }
            )));
        }

        #[test]
        fn choice_grants_never_refund() {
            let mut character = Character::new();
            character.set_optional_pool(SKILLS, Origin::Race, 1, names(&["Stealth"]));
            character.select_optional_proficiency(SKILLS, Origin::Race, "Stealth");
            character.add_proficiency(SKILLS, "Stealth", &tag("Class Choice"));
            assert!(character.optional_pool(SKILLS, Origin::Race).is_selected("Stealth"));
        }
    }

    mod remove_by_source {
        use super::*;

        #[test]
        fn choice_only_grant_is_fully_removed() {
            let mut character = Character::new();
            character.add_proficiency(SKILLS, "Stealth", &tag("Race Choice"));
            character.remove_proficiencies_by_source("Race");
            assert!(!character.has_proficiency(SKILLS, "Stealth"));
        }

        #[test]
        fn unbacked_selections_are_dropped() {
            let mut character = Character::new();
            character.set_optional_pool(SKILLS, Origin::Race, 1, names(&["Stealth"]));
            character.select_optional_proficiency(SKILLS, Origin::Race, "Stealth");

            character.remove_proficiencies_by_source("Race");
            assert!(character.optional_pool(SKILLS, Origin::Race).selected().is_empty());
            assert!(character.combined_optional_pool(SKILLS).selected.is_empty());
        }
    }

    mod ability_choices {
        use super::*;

        fn with_race_choice() -> Character {
            let mut character = Character::new();
            character.add_pending_ability_choice(PendingAbilityChoice::new(
                2,
                1,
                vec![Ability::Strength, Ability::Dexterity, Ability::Wisdom],
                tag("Race"),
            ));
            character
        }

        #[test]
        fn resolution_adds_tagged_bonuses() {
            let mut character = with_race_choice();
            let outcome =
                character.resolve_ability_choice(0, &[Ability::Strength, Ability::Wisdom]);
            assert!(outcome.is_resolved());
            assert_eq!(character.ability_total(Ability::Strength), 11);
            assert_eq!(
                character.ability_bonuses().entries(Ability::Wisdom)[0].source,
                tag("Race Choice 1")
            );
            assert!(character.pending_ability_choices()[0].is_resolved());
        }

        #[test]
        fn re_resolution_replaces_previous_picks() {
            let mut character = with_race_choice();
            character.resolve_ability_choice(0, &[Ability::Strength, Ability::Wisdom]);
            character.resolve_ability_choice(0, &[Ability::Dexterity, Ability::Wisdom]);
            assert_eq!(character.ability_total(Ability::Strength), 10);
            assert_eq!(character.ability_total(Ability::Dexterity), 11);
        }

        #[test]
        fn invalid_picks_change_nothing() {
            let mut character = with_race_choice();
            assert_eq!(
                character.resolve_ability_choice(0, &[Ability::Strength]),
                AbilityChoiceOutcome::WrongCount { expected: 2, got: 1 }
            );
            assert_eq!(
                character.resolve_ability_choice(0, &[Ability::Strength, Ability::Charisma]),
                AbilityChoiceOutcome::NotAllowed { ability: Ability::Charisma }
            );
            assert_eq!(
                character.resolve_ability_choice(0, &[Ability::Strength, Ability::Strength]),
                AbilityChoiceOutcome::Duplicate { ability: Ability::Strength }
            );
            assert_eq!(
                character.resolve_ability_choice(3, &[]),
                AbilityChoiceOutcome::NoSuchChoice { index: 3 }
            );
            assert!(character.ability_bonuses().is_empty());
        }

        #[test]
        fn clearing_choices_retracts_resolved_bonuses() {
            let mut character = with_race_choice();
            character.resolve_ability_choice(0, &[Ability::Strength, Ability::Wisdom]);
            assert_eq!(character.clear_pending_ability_choices(&tag("Race")), 1);
            assert!(character.ability_bonuses().is_empty());
            assert!(character.pending_ability_choices().is_empty());
        }

        #[test]
        fn empty_from_means_every_ability() {
            let choice = PendingAbilityChoice::new(1, 1, Vec::new(), tag("Feat: Resilient"));
            assert_eq!(choice.from.len(), 6);
        }
    }

    mod scalars {
        use super::*;

        #[test]
        fn max_hit_points_uses_constitution() {
            let mut character = Character::new();
            assert_eq!(character.max_hit_points(), None);
            character.set_hit_die(Some(10));
            character.set_ability_score(Ability::Constitution, 14);
            assert_eq!(character.max_hit_points(), Some(12));
            character.set_ability_score(Ability::Constitution, 1);
            assert_eq!(character.max_hit_points(), Some(5));
        }

        #[test]
        fn resistances_track_sources() {
            let mut character = Character::new();
            character.add_resistance("Poison", &tag("Race"));
            character.add_resistance("poison", &tag("Feat: Dwarven Fortitude"));
            assert_eq!(character.resistances().collect::<Vec<_>>(), vec!["poison"]);
            character.clear_resistances("Race");
            assert_eq!(character.resistances().count(), 1);
            character.clear_resistances("Feat: Dwarven Fortitude");
            assert_eq!(character.resistances().count(), 0);
        }
    }
}
