//! Build session use cases.
//!
//! A [`BuildSession`] exclusively owns one character for the duration of a
//! build. Each mutation completes on the aggregate before anything is
//! published: first the aggregate's queued events in order, then the external
//! cache invalidation (slot applies and linked feats), then a single
//! `CharacterUpdated`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use charbldr_domain::{
    Ability, AbilityChoiceOutcome, BuildSourceKind, Character, CombinedPool, DomainError, Origin,
    PersistedCharacter, ProficiencyType, SelectionOutcome, SourceTag,
};

use crate::infrastructure::ports::{EventSink, ExternalCachePort, RuleData};
use crate::infrastructure::settings::EngineSettings;
use crate::use_cases::build_source::{ApplyReport, BuildSelection, BuildSourceApplier};

/// One character under construction and the ports its changes are published to.
pub struct BuildSession {
    character: Character,
    applier: BuildSourceApplier,
    events: Arc<dyn EventSink>,
    cache: Arc<dyn ExternalCachePort>,
}

impl BuildSession {
    pub fn new(
        character: Character,
        applier: BuildSourceApplier,
        events: Arc<dyn EventSink>,
        cache: Arc<dyn ExternalCachePort>,
    ) -> Self {
        Self {
            character,
            applier,
            events,
            cache,
        }
    }

    /// A session over a fresh character carrying the configured defaults.
    pub fn from_settings(
        settings: &EngineSettings,
        events: Arc<dyn EventSink>,
        cache: Arc<dyn ExternalCachePort>,
    ) -> Self {
        Self::new(
            settings.new_character(),
            BuildSourceApplier::new(settings.apply_overrides),
            events,
            cache,
        )
    }

    /// Resumes a session from a persisted record.
    pub fn restore(
        persisted: PersistedCharacter,
        applier: BuildSourceApplier,
        events: Arc<dyn EventSink>,
        cache: Arc<dyn ExternalCachePort>,
    ) -> Result<Self, DomainError> {
        let character = Character::from_persisted(persisted)?;
        Ok(Self::new(character, applier, events, cache))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Replaces (or with `None`, clears) a build-source slot.
    pub fn apply_build_source(
        &mut self,
        kind: BuildSourceKind,
        selection: Option<&BuildSelection>,
    ) -> ApplyReport {
        let report = self.applier.apply(&mut self.character, kind, selection);
        self.publish(Some(kind), true);
        report
    }

    /// Grants `feat` as part of `kind`'s slot.
    pub fn apply_linked_feat(&mut self, kind: BuildSourceKind, feat: &RuleData) -> ApplyReport {
        let report = self.applier.apply_linked_feat(&mut self.character, kind, feat);
        self.publish(Some(kind), true);
        report
    }

    pub fn apply_feat(&mut self, feat: &RuleData) -> ApplyReport {
        let report = self.applier.apply_feat(&mut self.character, feat);
        self.publish(None, false);
        report
    }

    pub fn remove_feat(&mut self, name: &str) -> ApplyReport {
        let report = self.applier.remove_feat(&mut self.character, name);
        self.publish(None, false);
        report
    }

    pub fn select_optional_proficiency(
        &mut self,
        proficiency_type: ProficiencyType,
        origin: Origin,
        name: &str,
    ) -> SelectionOutcome {
        let outcome = self
            .character
            .select_optional_proficiency(proficiency_type, origin, name);
        if outcome.is_selected() {
            self.publish(None, false);
        }
        outcome
    }

    pub fn deselect_optional_proficiency(
        &mut self,
        proficiency_type: ProficiencyType,
        origin: Origin,
        name: &str,
    ) -> bool {
        let removed = self
            .character
            .deselect_optional_proficiency(proficiency_type, origin, name);
        if removed {
            self.publish(None, false);
        }
        removed
    }

    pub fn add_ability_bonus(&mut self, ability: &str, value: i32, source: &SourceTag) -> bool {
        let added = self.character.add_ability_bonus(ability, value, source);
        if added {
            self.publish(None, false);
        }
        added
    }

    pub fn clear_ability_bonuses(&mut self, source: &str) -> usize {
        let cleared = self.character.clear_ability_bonuses(source);
        if cleared > 0 {
            self.publish(None, false);
        }
        cleared
    }

    pub fn set_ability_score(&mut self, ability: Ability, score: i32) {
        self.character.set_ability_score(ability, score);
        self.publish(None, false);
    }

    pub fn resolve_ability_choice(
        &mut self,
        index: usize,
        picks: &[Ability],
    ) -> AbilityChoiceOutcome {
        let outcome = self.character.resolve_ability_choice(index, picks);
        if outcome.is_resolved() {
            self.publish(None, false);
        }
        outcome
    }

    fn publish(&mut self, kind: Option<BuildSourceKind>, invalidate: bool) {
        for event in self.character.take_events() {
            self.events.publish(&event);
        }
        if let (true, Some(kind)) = (invalidate, kind) {
            self.cache.invalidate(kind);
        }
        self.character.mark_updated(kind);
        for event in self.character.take_events() {
            self.events.publish(&event);
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn into_character(self) -> Character {
        self.character
    }

    pub fn proficiencies_with_sources(
        &self,
        proficiency_type: ProficiencyType,
    ) -> BTreeMap<String, BTreeSet<SourceTag>> {
        self.character.proficiencies_with_sources(proficiency_type)
    }

    pub fn combined_optional_pool(&self, proficiency_type: ProficiencyType) -> &CombinedPool {
        self.character.combined_optional_pool(proficiency_type)
    }

    pub fn is_proficiency_available_for_selection(
        &self,
        proficiency_type: ProficiencyType,
        name: &str,
    ) -> bool {
        self.character
            .is_proficiency_available_for_selection(proficiency_type, name)
    }

    pub fn has_proficiency(&self, proficiency_type: ProficiencyType, name: &str) -> bool {
        self.character.has_proficiency(proficiency_type, name)
    }

    pub fn to_persisted(&self) -> PersistedCharacter {
        self.character.to_persisted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::event_sink::{CoalescingEventSink, NoopExternalCache};
    use crate::infrastructure::ports::{MockEventSink, MockExternalCachePort};
    use charbldr_domain::BuildEvent;
    use chrono::TimeZone;
    use mockall::Sequence;
    use serde_json::json;
    use std::time::Duration;

    fn elf() -> BuildSelection {
        BuildSelection::new(
            RuleData::from_value(json!({
                "name": "Elf",
                "source": "PHB",
                "ability": [{ "dex": 2 }],
                "skillProficiencies": [{ "perception": true }],
                "languageProficiencies": [{ "common": true, "elvish": true }]
            }))
            .unwrap(),
        )
    }

    fn dwarf() -> BuildSelection {
        BuildSelection::new(
            RuleData::from_value(json!({
                "name": "Dwarf",
                "source": "PHB",
                "skillProficiencies": [{ "choose": { "from": ["stealth", "athletics"] } }]
            }))
            .unwrap(),
        )
    }

    fn session(events: MockEventSink, cache: MockExternalCachePort) -> BuildSession {
        BuildSession::new(
            Character::new(),
            BuildSourceApplier::default(),
            Arc::new(events),
            Arc::new(cache),
        )
    }

    mod apply_build_source {
        use super::*;

        #[test]
        fn publishes_events_then_invalidates_then_signals_once() {
            let mut seq = Sequence::new();
            let mut events = MockEventSink::new();
            let mut cache = MockExternalCachePort::new();

            events
                .expect_publish()
                .withf(|e| matches!(e, BuildEvent::ProficiencyAdded { .. }))
                .times(3)
                .in_sequence(&mut seq)
                .return_const(());
            cache
                .expect_invalidate()
                .withf(|kind| *kind == BuildSourceKind::Race)
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
            events
                .expect_publish()
                .withf(|e| *e == BuildEvent::CharacterUpdated { kind: Some(BuildSourceKind::Race) })
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());

            let mut session = session(events, cache);
            session.apply_build_source(BuildSourceKind::Race, Some(&elf()));

            assert!(session.has_proficiency(ProficiencyType::Skills, "Perception"));
            assert_eq!(session.character().pending_event_count(), 0);
        }

        #[test]
        fn clearing_a_slot_still_invalidates() {
            let mut events = MockEventSink::new();
            events.expect_publish().return_const(());
            let mut cache = MockExternalCachePort::new();
            cache
                .expect_invalidate()
                .withf(|kind| *kind == BuildSourceKind::Class)
                .times(1)
                .return_const(());

            let mut session = session(events, cache);
            let report = session.apply_build_source(BuildSourceKind::Class, None);
            assert_eq!(report.kind, Some(BuildSourceKind::Class));
        }
    }

    mod selections {
        use super::*;

        fn quiet_cache() -> MockExternalCachePort {
            let mut cache = MockExternalCachePort::new();
            cache.expect_invalidate().return_const(());
            cache
        }

        #[test]
        fn selection_publishes_without_invalidating() {
            let mut events = MockEventSink::new();
            events.expect_publish().return_const(());
            let mut cache = MockExternalCachePort::new();
            cache
                .expect_invalidate()
                .times(1)
                .return_const(());

            let mut session = session(events, cache);
            session.apply_build_source(BuildSourceKind::Race, Some(&dwarf()));

            assert!(session
                .select_optional_proficiency(ProficiencyType::Skills, Origin::Race, "stealth")
                .is_selected());
            assert_eq!(
                session.combined_optional_pool(ProficiencyType::Skills).selected,
                vec!["Stealth".to_string()]
            );
            assert!(session.deselect_optional_proficiency(
                ProficiencyType::Skills,
                Origin::Race,
                "Stealth"
            ));
            assert!(!session.has_proficiency(ProficiencyType::Skills, "Stealth"));
        }

        #[test]
        fn rejected_selection_publishes_nothing() {
            let mut events = MockEventSink::new();
            events.expect_publish().never();
            let mut cache = MockExternalCachePort::new();
            cache.expect_invalidate().never();

            let mut session = session(events, cache);

            assert_eq!(
                session.select_optional_proficiency(
                    ProficiencyType::Skills,
                    Origin::Race,
                    "Stealth"
                ),
                SelectionOutcome::NotAnOption
            );
            assert!(!session.deselect_optional_proficiency(
                ProficiencyType::Skills,
                Origin::Race,
                "Stealth"
            ));
            assert_eq!(session.clear_ability_bonuses("Race"), 0);
        }

        #[test]
        fn fixed_grants_are_not_available_for_selection() {
            let mut events = MockEventSink::new();
            events.expect_publish().return_const(());
            let mut session = session(events, quiet_cache());
            session.apply_build_source(BuildSourceKind::Race, Some(&elf()));

            let skills = ProficiencyType::Skills;
            assert!(!session.is_proficiency_available_for_selection(skills, "perception"));
            assert!(session.is_proficiency_available_for_selection(skills, "Stealth"));
            let sources = session.proficiencies_with_sources(ProficiencyType::Languages);
            assert_eq!(sources["Common"].len(), 2);
        }
    }

    mod abilities {
        use super::*;

        #[test]
        fn bonus_and_choice_changes_publish_updates() {
            let mut events = MockEventSink::new();
            events
                .expect_publish()
                .withf(|e| e.is_character_updated())
                .times(3)
                .return_const(());
            let mut session = session(events, MockExternalCachePort::new());

            let manual = SourceTag::new("Manual");
            assert!(session.add_ability_bonus("str", 2, &manual));
            session.set_ability_score(Ability::Strength, 15);
            assert_eq!(session.clear_ability_bonuses("Manual"), 1);
            assert!(!session.add_ability_bonus("", 2, &manual));
            assert_eq!(session.character().ability_total(Ability::Strength), 15);

            assert!(matches!(
                session.resolve_ability_choice(0, &[Ability::Strength]),
                AbilityChoiceOutcome::NoSuchChoice { index: 0 }
            ));
        }
    }

    mod feats {
        use super::*;

        #[test]
        fn standalone_feats_do_not_touch_the_cache() {
            let mut events = MockEventSink::new();
            events.expect_publish().return_const(());
            let mut cache = MockExternalCachePort::new();
            cache.expect_invalidate().never();
            let mut session = session(events, cache);

            let feat = RuleData::from_value(json!({
                "name": "Linguist",
                "ability": [{ "int": 1 }],
                "languageProficiencies": [{ "dwarvish": true }]
            }))
            .unwrap();
            session.apply_feat(&feat);
            assert!(session.has_proficiency(ProficiencyType::Languages, "Dwarvish"));

            session.remove_feat("Linguist");
            assert!(!session.has_proficiency(ProficiencyType::Languages, "Dwarvish"));
            assert!(session.character().feats().is_empty());
        }

        #[test]
        fn linked_feat_invalidates_its_slot() {
            let mut events = MockEventSink::new();
            events.expect_publish().return_const(());
            let mut cache = MockExternalCachePort::new();
            cache
                .expect_invalidate()
                .withf(|kind| *kind == BuildSourceKind::Race)
                .times(1)
                .return_const(());
            let mut session = session(events, cache);

            session.apply_linked_feat(BuildSourceKind::Race, &RuleData::new("Alert", "PHB"));
        }
    }

    mod persistence {
        use super::*;

        #[test]
        fn restored_session_reads_the_same() {
            let mut session = BuildSession::new(
                Character::new(),
                BuildSourceApplier::default(),
                Arc::new(crate::infrastructure::event_sink::TracingEventSink),
                Arc::new(NoopExternalCache),
            );
            session.apply_build_source(BuildSourceKind::Race, Some(&dwarf()));
            session.select_optional_proficiency(ProficiencyType::Skills, Origin::Race, "Athletics");

            let restored = BuildSession::restore(
                session.to_persisted(),
                BuildSourceApplier::default(),
                Arc::new(crate::infrastructure::event_sink::TracingEventSink),
                Arc::new(NoopExternalCache),
            )
            .unwrap();

            for proficiency_type in ProficiencyType::ALL {
                assert_eq!(
                    restored.proficiencies_with_sources(proficiency_type),
                    session.proficiencies_with_sources(proficiency_type)
                );
                assert_eq!(
                    restored.combined_optional_pool(proficiency_type),
                    session.combined_optional_pool(proficiency_type)
                );
            }
        }
    }

    mod coalescing {
        use super::*;

        #[test]
        fn refresh_signals_inside_the_window_are_dropped_at_the_boundary() {
            let mut inner = MockEventSink::new();
            inner
                .expect_publish()
                .withf(|e| e.is_character_updated())
                .times(1)
                .return_const(());
            inner
                .expect_publish()
                .withf(|e| !e.is_character_updated())
                .return_const(());

            let clock = FixedClock(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
            let sink = CoalescingEventSink::new(
                Arc::new(inner),
                Arc::new(clock),
                Duration::from_millis(50),
            );
            let mut session = BuildSession::new(
                Character::new(),
                BuildSourceApplier::default(),
                Arc::new(sink),
                Arc::new(NoopExternalCache),
            );

            session.apply_build_source(BuildSourceKind::Race, Some(&elf()));
            session.apply_build_source(BuildSourceKind::Race, Some(&dwarf()));
            session.set_ability_score(Ability::Wisdom, 12);
        }
    }
}
