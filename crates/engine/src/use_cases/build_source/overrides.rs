//! Named rule exceptions layered over generic derivation.

use charbldr_domain::common::eq_for_lookup;
use charbldr_domain::value_objects::catalog::any_options;
use charbldr_domain::{Ability, BuildSourceKind, Character, ProficiencyType};

use crate::infrastructure::ports::RuleData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideEffect {
    /// Replaces every fixed `Race` bonus with exactly this one.
    FixedAbilityBonus { ability: Ability, amount: i32 },
    /// Forces the race skill pool to `allowed` picks from the full skill list.
    SkillChoiceAllowance { allowed: u32 },
}

/// One exception, keyed on race name and source plus an optional subrace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOverride {
    pub name: &'static str,
    race: &'static str,
    source: &'static str,
    subrace: Option<&'static str>,
    effect: OverrideEffect,
}

pub const RACE_OVERRIDES: &[RuleOverride] = &[
    // 5etools lists the +2 CHA in the same entry as the choice
    RuleOverride {
        name: "half-elf-charisma",
        race: "Half-Elf",
        source: "PHB",
        subrace: None,
        effect: OverrideEffect::FixedAbilityBonus {
            ability: Ability::Charisma,
            amount: 2,
        },
    },
    RuleOverride {
        name: "variant-human-skill",
        race: "Human",
        source: "PHB",
        subrace: Some("Variant"),
        effect: OverrideEffect::SkillChoiceAllowance { allowed: 1 },
    },
];

impl RuleOverride {
    fn matches(&self, race: &RuleData, subrace: Option<&RuleData>) -> bool {
        if !race.matches(self.race, Some(self.source)) {
            return false;
        }
        match self.subrace {
            None => true,
            Some(expected) => subrace.is_some_and(|s| eq_for_lookup(&s.name, expected)),
        }
    }

    fn apply(&self, character: &mut Character) {
        let kind = BuildSourceKind::Race;
        match self.effect {
            OverrideEffect::FixedAbilityBonus { ability, amount } => {
                let tag = kind.tag();
                character.clear_ability_bonuses(tag.as_str());
                character.add_ability_bonus(ability.as_str(), amount, &tag);
            }
            OverrideEffect::SkillChoiceAllowance { allowed } => {
                character.set_optional_pool(
                    ProficiencyType::Skills,
                    kind.origin(),
                    allowed,
                    any_options(ProficiencyType::Skills),
                );
            }
        }
        tracing::debug!(rule_override = self.name, "Applied rule override");
    }
}

/// Applies every race override matching the selection; returns their names.
pub fn apply_race_overrides(
    character: &mut Character,
    race: &RuleData,
    subrace: Option<&RuleData>,
) -> Vec<&'static str> {
    RACE_OVERRIDES
        .iter()
        .filter(|o| o.matches(race, subrace))
        .map(|o| {
            o.apply(character);
            o.name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use charbldr_domain::Origin;

    #[test]
    fn half_elf_gets_exactly_one_charisma_bonus() {
        let mut character = Character::new();
        let tag = BuildSourceKind::Race.tag();
        character.add_ability_bonus("dex", 1, &tag);

        let applied = apply_race_overrides(&mut character, &RuleData::new("half-elf", "phb"), None);

        assert_eq!(applied, vec!["half-elf-charisma"]);
        assert_eq!(character.ability_bonuses().total(Ability::Charisma), 2);
        assert_eq!(character.ability_bonuses().total(Ability::Dexterity), 0);
    }

    #[test]
    fn variant_human_forces_single_skill_choice() {
        let mut character = Character::new();
        character.set_optional_pool(
            ProficiencyType::Skills,
            Origin::Race,
            2,
            vec!["Stealth".to_string()],
        );

        let human = RuleData::new("Human", "PHB");
        let variant = RuleData::new("Variant", "PHB");
        let applied = apply_race_overrides(&mut character, &human, Some(&variant));

        assert_eq!(applied, vec!["variant-human-skill"]);
        let pool = character.optional_pool(ProficiencyType::Skills, Origin::Race);
        assert_eq!(pool.allowed(), 1);
        assert_eq!(pool.options().len(), 18);
    }

    #[test]
    fn non_matching_selections_are_untouched() {
        let mut character = Character::new();
        let before = character.clone();

        let human = RuleData::new("Human", "PHB");
        let half_elf = RuleData::new("Half-Elf", "MPMM");
        assert!(apply_race_overrides(&mut character, &human, None).is_empty());
        assert!(apply_race_overrides(&mut character, &half_elf, None).is_empty());
        assert_eq!(character, before);
    }
}
