//! Persisted representation of a [`Character`].
//!
//! Maps and sets are flattened to plain objects and arrays with string keys so
//! the record stays readable by other tools. The in-memory ledgers never depend
//! on this shape; conversion happens only here.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use super::character::{BuildIdentity, Character, PendingAbilityChoice, DEFAULT_SIZE, DEFAULT_SPEED};
use crate::entities::{AbilityBonus, ChoicePool, TraitEntry};
use crate::error::DomainError;
use crate::value_objects::{Ability, BuildSourceKind, Origin, ProficiencyType, SourceTag};
use crate::CharacterId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedPool {
    pub allowed: u32,
    pub options: Vec<String>,
    pub selected: Vec<String>,
}

/// Combined view plus the three per-origin pools of one proficiency type.
///
/// The combined fields are informational; they are recomputed on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedOptional {
    pub allowed: u32,
    pub options: Vec<String>,
    pub selected: Vec<String>,
    pub race: PersistedPool,
    pub class: PersistedPool,
    pub background: PersistedPool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedFeatures {
    pub darkvision: u32,
    pub resistances: BTreeMap<String, Vec<SourceTag>>,
    pub traits: BTreeMap<String, TraitEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCharacter {
    pub id: CharacterId,
    #[serde(default)]
    pub allowed_sources: Vec<String>,
    #[serde(default)]
    pub ability_scores: BTreeMap<String, i32>,
    #[serde(default)]
    pub ability_bonuses: BTreeMap<String, Vec<AbilityBonus>>,
    #[serde(default)]
    pub pending_ability_choices: Vec<PendingAbilityChoice>,
    #[serde(default)]
    pub proficiencies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub proficiency_sources: BTreeMap<String, BTreeMap<String, Vec<SourceTag>>>,
    #[serde(default)]
    pub optional_proficiencies: BTreeMap<String, PersistedOptional>,
    #[serde(default)]
    pub features: PersistedFeatures,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default)]
    pub hit_die: Option<u32>,
    #[serde(default)]
    pub race: BuildIdentity,
    #[serde(default)]
    pub class: BuildIdentity,
    #[serde(default)]
    pub background: BuildIdentity,
    #[serde(default)]
    pub feats: Vec<String>,
}

fn default_size() -> String {
    DEFAULT_SIZE.to_string()
}

fn default_speed() -> u32 {
    DEFAULT_SPEED
}

fn persisted_pool(pool: &ChoicePool) -> PersistedPool {
    PersistedPool {
        allowed: pool.allowed(),
        options: pool.options().to_vec(),
        selected: pool.selected().to_vec(),
    }
}

impl Character {
    /// Flattens the character into its persisted shape.
    pub fn to_persisted(&self) -> PersistedCharacter {
        let ability_scores = Ability::ALL
            .into_iter()
            .map(|a| (a.as_str().to_string(), self.ability_score(a)))
            .collect();

        let ability_bonuses = self
            .ability_bonuses()
            .iter()
            .map(|(a, bonuses)| (a.as_str().to_string(), bonuses.to_vec()))
            .collect();

        let mut proficiencies = BTreeMap::new();
        let mut proficiency_sources = BTreeMap::new();
        for proficiency_type in ProficiencyType::ALL {
            let with_sources = self.proficiencies_with_sources(proficiency_type);
            if with_sources.is_empty() {
                continue;
            }
            let key = proficiency_type.as_str().to_string();
            proficiencies.insert(key.clone(), with_sources.keys().cloned().collect());
            proficiency_sources.insert(
                key,
                with_sources
                    .into_iter()
                    .map(|(name, tags)| (name, tags.into_iter().collect()))
                    .collect(),
            );
        }

        let optional_proficiencies = self
            .optional_proficiencies()
            .iter()
            .map(|(proficiency_type, optional)| {
                let combined = optional.combined();
                (
                    proficiency_type.as_str().to_string(),
                    PersistedOptional {
                        allowed: combined.allowed,
                        options: combined.options.clone(),
                        selected: combined.selected.clone(),
                        race: persisted_pool(optional.pool(Origin::Race)),
                        class: persisted_pool(optional.pool(Origin::Class)),
                        background: persisted_pool(optional.pool(Origin::Background)),
                    },
                )
            })
            .collect();

        let features = PersistedFeatures {
            darkvision: self.darkvision(),
            resistances: self
                .resistance_sources()
                .iter()
                .map(|(name, tags)| (name.clone(), tags.iter().cloned().collect()))
                .collect(),
            traits: self
                .traits()
                .iter()
                .map(|(name, entry)| (name.to_string(), entry.clone()))
                .collect(),
        };

        PersistedCharacter {
            id: self.id(),
            allowed_sources: self.allowed_sources().to_vec(),
            ability_scores,
            ability_bonuses,
            pending_ability_choices: self.pending_ability_choices().to_vec(),
            proficiencies,
            proficiency_sources,
            optional_proficiencies,
            features,
            size: self.size().to_string(),
            speed: self.speed(),
            hit_die: self.hit_die(),
            race: self.identity(BuildSourceKind::Race).clone(),
            class: self.identity(BuildSourceKind::Class).clone(),
            background: self.identity(BuildSourceKind::Background).clone(),
            feats: self.feats().to_vec(),
        }
    }

    /// Rebuilds a character from its persisted shape.
    ///
    /// Unknown ability or proficiency-type keys and over-capacity pools are
    /// rejected. Names listed without any source are dropped with a warning,
    /// and selections missing their choice tag get it re-granted.
    pub fn from_persisted(persisted: PersistedCharacter) -> Result<Self, DomainError> {
        let mut character = Character::empty(persisted.id);

        for (key, score) in &persisted.ability_scores {
            character.set_ability_score(key.parse::<Ability>()?, *score);
        }
        for (key, bonuses) in &persisted.ability_bonuses {
            let ability = key.parse::<Ability>()?;
            for bonus in bonuses {
                character.add_ability_bonus(ability.as_str(), bonus.value, &bonus.source);
            }
        }

        let mut parts = character.restore_parts();
        parts.allowed_sources(persisted.allowed_sources);
        parts.pending_ability_choices(persisted.pending_ability_choices);
        parts.feats(persisted.feats);
        parts.resistances(
            persisted
                .features
                .resistances
                .into_iter()
                .map(|(name, tags)| (name, tags.into_iter().collect::<BTreeSet<_>>()))
                .collect(),
        );

        for (key, sources) in &persisted.proficiency_sources {
            let proficiency_type = key.parse::<ProficiencyType>()?;
            for (name, tags) in sources {
                for tag in tags {
                    parts.grant(proficiency_type, name, tag);
                }
            }
        }

        for (key, optional) in persisted.optional_proficiencies {
            let proficiency_type = key.parse::<ProficiencyType>()?;
            for (origin, pool) in [
                (Origin::Race, optional.race),
                (Origin::Class, optional.class),
                (Origin::Background, optional.background),
            ] {
                let restored = ChoicePool::restore(pool.allowed, pool.options, pool.selected)
                    .map_err(|reason| {
                        DomainError::constraint(format!(
                            "{}/{} pool: {}",
                            proficiency_type, origin, reason
                        ))
                    })?;
                for name in restored.selected() {
                    parts.grant(proficiency_type, name, &origin.choice_tag());
                }
                parts.pool(proficiency_type, origin, restored);
            }
        }
        parts.recombine();

        for (key, names) in &persisted.proficiencies {
            let proficiency_type = key.parse::<ProficiencyType>()?;
            for name in names {
                if !character.has_proficiency(proficiency_type, name) {
                    tracing::warn!(
                        proficiency_type = %proficiency_type,
                        name = %name,
                        "Dropping persisted proficiency without any source"
                    );
                }
            }
        }

        for (name, entry) in &persisted.features.traits {
            character.add_trait(name, entry.description.clone(), &entry.source);
        }
        character.set_darkvision(persisted.features.darkvision);
        character.set_size(persisted.size);
        character.set_speed(persisted.speed);
        character.set_hit_die(persisted.hit_die);
        character.set_identity(BuildSourceKind::Race, persisted.race);
        character.set_identity(BuildSourceKind::Class, persisted.class);
        character.set_identity(BuildSourceKind::Background, persisted.background);

        Ok(character)
    }
}

impl Serialize for Character {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_persisted().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Character {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let persisted = PersistedCharacter::deserialize(deserializer)?;
        Character::from_persisted(persisted).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SKILLS: ProficiencyType = ProficiencyType::Skills;

    fn built_character() -> Character {
        let mut character = Character::new();
        let race = SourceTag::new("Race");
        character.set_identity(
            BuildSourceKind::Race,
            BuildIdentity::new("Elf", "PHB").with_sub("High Elf"),
        );
        character.add_ability_bonus("dex", 2, &race);
        character.add_ability_bonus("int", 1, &SourceTag::new("Subrace"));
        character.add_trait("Fey Ancestry", "Advantage against charm.", &race);
        character.add_proficiency(SKILLS, "Perception", &race);
        character.add_proficiency(
            ProficiencyType::Weapons,
            "Longsword",
            &SourceTag::new("Subrace"),
        );
        character.set_optional_pool(
            ProficiencyType::Languages,
            Origin::Race,
            1,
            vec!["Dwarvish".to_string(), "Giant".to_string()],
        );
        character.select_optional_proficiency(ProficiencyType::Languages, Origin::Race, "Giant");
        character.add_pending_ability_choice(PendingAbilityChoice::new(
            1,
            1,
            Vec::new(),
            SourceTag::feat("Resilient"),
        ));
        character.resolve_ability_choice(0, &[Ability::Constitution]);
        character.record_feat("Resilient");
        character.add_resistance("poison", &race);
        character.set_darkvision(60);
        character.set_hit_die(Some(8));
        character.take_events();
        character
    }

    #[test]
    fn round_trip_preserves_every_read() {
        let original = built_character();
        let json = serde_json::to_string(&original).unwrap();
        let restored: Character = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, original);
        for t in ProficiencyType::ALL {
            assert_eq!(
                restored.proficiencies_with_sources(t),
                original.proficiencies_with_sources(t)
            );
            assert_eq!(restored.combined_optional_pool(t), original.combined_optional_pool(t));
        }
        assert_eq!(restored.max_hit_points(), original.max_hit_points());
    }

    #[test]
    fn persisted_shape_flattens_sources() {
        let json = serde_json::to_value(built_character()).unwrap();
        assert_eq!(json["proficiencySources"]["skills"]["Perception"], json!(["Race"]));
        assert_eq!(
            json["optionalProficiencies"]["languages"]["race"]["selected"],
            json!(["Giant"])
        );
        assert_eq!(json["abilityBonuses"]["dexterity"][0]["value"], 2);
        assert_eq!(json["race"]["sub"], "High Elf");
    }

    #[test]
    fn rejects_over_capacity_pool() {
        let mut persisted = Character::new().to_persisted();
        persisted.optional_proficiencies.insert(
            "skills".to_string(),
            PersistedOptional {
                race: PersistedPool {
                    allowed: 1,
                    options: vec!["Stealth".to_string(), "Athletics".to_string()],
                    selected: vec!["Stealth".to_string(), "Athletics".to_string()],
                },
                ..Default::default()
            },
        );
        let err = Character::from_persisted(persisted).unwrap_err();
        assert!(matches!(err, DomainError::Constraint(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let mut persisted = Character::new().to_persisted();
        persisted.ability_scores.insert("luck".to_string(), 12);
        assert!(matches!(
            Character::from_persisted(persisted),
            Err(DomainError::Parse(_))
        ));
    }

    #[test]
    fn sourceless_names_are_dropped_and_missing_choice_tags_restored() {
        let mut persisted = Character::new().to_persisted();
        persisted
            .proficiencies
            .insert("skills".to_string(), vec!["Arcana".to_string()]);
        persisted.optional_proficiencies.insert(
            "skills".to_string(),
            PersistedOptional {
                class: PersistedPool {
                    allowed: 1,
                    options: vec!["History".to_string()],
                    selected: vec!["History".to_string()],
                },
                ..Default::default()
            },
        );
        let character = Character::from_persisted(persisted).unwrap();
        assert!(!character.has_proficiency(SKILLS, "Arcana"));
        assert!(character.has_proficiency(SKILLS, "History"));
        assert_eq!(character.combined_optional_pool(SKILLS).allowed, 1);
    }

    #[test]
    fn minimal_record_uses_defaults() {
        let id = CharacterId::new();
        let character: Character = serde_json::from_value(json!({ "id": id })).unwrap();
        assert_eq!(character.id(), id);
        assert_eq!(character.speed(), 30);
        assert_eq!(character.ability_score(Ability::Wisdom), 10);
        assert!(!character.has_proficiency(ProficiencyType::Languages, "Common"));
    }
}
