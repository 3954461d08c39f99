//! Generic rule-data derivation.
//!
//! Turns one [`RuleData`] entry into the grants it contributes, without
//! touching a character. Malformed parts are skipped with a warning so one bad
//! entry cannot abort an apply.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use charbldr_domain::value_objects::catalog::{
    self, any_options, canonical_name, ARTISANS_TOOLS, GAMING_SETS, MUSICAL_INSTRUMENTS,
    STANDARD_LANGUAGES,
};
use charbldr_domain::{Ability, ProficiencyType};

use crate::infrastructure::ports::RuleData;

/// An unresolved "increase N abilities by `amount`" grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityChoiceGrant {
    pub count: u32,
    pub amount: i32,
    pub from: Vec<Ability>,
}

/// Allowance and options one source adds to a choice pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolGrant {
    pub allowed: u32,
    pub options: Vec<String>,
}

impl PoolGrant {
    fn merge(&mut self, allowed: u32, options: Vec<String>) {
        self.allowed += allowed;
        for option in options {
            if !self.options.iter().any(|o| o.eq_ignore_ascii_case(&option)) {
                self.options.push(option);
            }
        }
    }
}

/// Everything one rule entry grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceGrants {
    pub ability_bonuses: Vec<(Ability, i32)>,
    pub ability_choices: Vec<AbilityChoiceGrant>,
    pub traits: Vec<(String, String)>,
    pub proficiencies: Vec<(ProficiencyType, String)>,
    pub pools: BTreeMap<ProficiencyType, PoolGrant>,
    pub size: Option<String>,
    pub speed: Option<u32>,
    pub darkvision: Option<u32>,
    pub resistances: Vec<String>,
    pub hit_die: Option<u32>,
}

impl SourceGrants {
    fn add_pool(&mut self, proficiency_type: ProficiencyType, allowed: u32, options: Vec<String>) {
        if allowed == 0 || options.is_empty() {
            tracing::warn!(
                proficiency_type = %proficiency_type,
                allowed,
                options = options.len(),
                "Skipping empty proficiency choice"
            );
            return;
        }
        self.pools.entry(proficiency_type).or_default().merge(allowed, options);
    }

    /// Folds `other`'s pools into this one's, summing allowances.
    pub fn merge_pools(&mut self, other: &SourceGrants) {
        for (proficiency_type, pool) in &other.pools {
            self.pools
                .entry(*proficiency_type)
                .or_default()
                .merge(pool.allowed, pool.options.clone());
        }
    }
}

/// Derives every grant `rule` contributes.
pub fn derive(rule: &RuleData) -> SourceGrants {
    let mut grants = SourceGrants::default();

    derive_abilities(rule, &mut grants);
    derive_traits(rule, &mut grants);

    let blocks = [
        (ProficiencyType::Skills, &rule.skill_proficiencies),
        (ProficiencyType::Languages, &rule.language_proficiencies),
        (ProficiencyType::Tools, &rule.tool_proficiencies),
        (ProficiencyType::Weapons, &rule.weapon_proficiencies),
        (ProficiencyType::Armor, &rule.armor_proficiencies),
        (ProficiencyType::Skills, &rule.starting_proficiencies.skills),
    ];
    for (proficiency_type, block) in blocks {
        derive_proficiency_block(&rule.name, proficiency_type, block, &mut grants);
    }
    derive_starting_lists(rule, &mut grants);
    derive_saving_throws(rule, &mut grants);
    derive_scalars(rule, &mut grants);

    grants
}

// =============================================================================
// Abilities
// =============================================================================

fn derive_abilities(rule: &RuleData, grants: &mut SourceGrants) {
    for entry in &rule.ability {
        let Some(object) = entry.as_object() else {
            tracing::warn!(
                source = %rule.name,
                entry = %entry,
                "Skipping non-object ability entry"
            );
            continue;
        };

        // Entries carrying a choice become pending choices as a whole
        if let Some(choose) = object.get("choose") {
            derive_ability_choice(&rule.name, choose, grants);
            continue;
        }

        for (key, value) in object {
            match (Ability::parse(key), value.as_i64()) {
                (Some(ability), Some(amount)) => {
                    grants.ability_bonuses.push((ability, amount as i32))
                }
                _ => tracing::warn!(
                    source = %rule.name,
                    key = %key,
                    value = %value,
                    "Skipping unknown ability key"
                ),
            }
        }
    }
}

fn derive_ability_choice(source: &str, choose: &Value, grants: &mut SourceGrants) {
    // { "weighted": { "from": [...], "weights": [2, 1] } }
    if let Some(weighted) = choose.get("weighted") {
        let from = parse_abilities(source, weighted.get("from"));
        let weights = weighted.get("weights").and_then(Value::as_array);
        for weight in weights.into_iter().flatten().filter_map(Value::as_i64) {
            grants.ability_choices.push(AbilityChoiceGrant {
                count: 1,
                amount: weight as i32,
                from: from.clone(),
            });
        }
        return;
    }

    let count = choose.get("count").and_then(Value::as_u64).unwrap_or(1) as u32;
    let amount = choose.get("amount").and_then(Value::as_i64).unwrap_or(1) as i32;
    grants.ability_choices.push(AbilityChoiceGrant {
        count,
        amount,
        from: parse_abilities(source, choose.get("from")),
    });
}

/// An absent or empty `from` means any ability.
fn parse_abilities(source: &str, from: Option<&Value>) -> Vec<Ability> {
    let parsed: Vec<Ability> = from
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|v| {
            let ability = v.as_str().and_then(Ability::parse);
            if ability.is_none() {
                tracing::warn!(source = %source, value = %v, "Skipping unknown ability in choice");
            }
            ability
        })
        .collect();
    if parsed.is_empty() {
        Ability::ALL.to_vec()
    } else {
        parsed
    }
}

// =============================================================================
// Traits
// =============================================================================

fn derive_traits(rule: &RuleData, grants: &mut SourceGrants) {
    for entry in &rule.entries {
        let is_named_block = entry.get("type").and_then(Value::as_str) == Some("entries");
        let name = entry.get("name").and_then(Value::as_str).map(str::trim).unwrap_or_default();
        if !is_named_block || name.is_empty() {
            continue;
        }
        let mut lines = Vec::new();
        if let Some(children) = entry.get("entries") {
            flatten_text(children, &mut lines);
        }
        grants.traits.push((name.to_string(), lines.join("\n")));
    }
}

/// Collects the text of a nested 5etools entry tree in reading order.
pub fn flatten_text(value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| flatten_text(item, lines)),
        Value::Object(map) => {
            for key in ["entries", "items", "entry"] {
                if let Some(child) = map.get(key) {
                    flatten_text(child, lines);
                }
            }
        }
        _ => {}
    }
}

// =============================================================================
// Proficiencies
// =============================================================================

/// Options offered by a choice key, or `None` when the key is not a choice.
fn choice_options(proficiency_type: ProficiencyType, key: &str) -> Option<Vec<String>> {
    let owned = |names: &[&str]| -> Vec<String> { names.iter().map(|n| n.to_string()).collect() };
    match (proficiency_type, key) {
        (_, "any") => Some(any_options(proficiency_type)),
        (ProficiencyType::Languages, "anyStandard" | "other") => Some(owned(STANDARD_LANGUAGES)),
        (ProficiencyType::Languages, "anyExotic") => Some(owned(catalog::EXOTIC_LANGUAGES)),
        (ProficiencyType::Tools, "anyArtisansTool") => Some(owned(ARTISANS_TOOLS)),
        (ProficiencyType::Tools, "anyMusicalInstrument") => Some(owned(MUSICAL_INSTRUMENTS)),
        (ProficiencyType::Tools, "anyGamingSet") => Some(owned(GAMING_SETS)),
        _ => None,
    }
}

fn derive_proficiency_block(
    source: &str,
    proficiency_type: ProficiencyType,
    block: &[Value],
    grants: &mut SourceGrants,
) {
    let Some(first) = block.first() else {
        return;
    };
    if block.len() > 1 {
        tracing::debug!(
            source = %source,
            proficiency_type = %proficiency_type,
            alternatives = block.len(),
            "Using first proficiency alternative"
        );
    }
    let Some(object) = first.as_object() else {
        tracing::warn!(
            source = %source,
            proficiency_type = %proficiency_type,
            "Skipping non-object proficiency block"
        );
        return;
    };
    derive_proficiency_object(source, proficiency_type, object, grants);
}

fn derive_proficiency_object(
    source: &str,
    proficiency_type: ProficiencyType,
    object: &Map<String, Value>,
    grants: &mut SourceGrants,
) {
    for (key, value) in object {
        if key == "choose" {
            let options: Vec<String> = value
                .get("from")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(|raw| canonical_name(proficiency_type, raw))
                .collect();
            let count = value.get("count").and_then(Value::as_u64).unwrap_or(1) as u32;
            grants.add_pool(proficiency_type, count, options);
            continue;
        }

        if let Some(options) = choice_options(proficiency_type, key) {
            let allowed = match value {
                Value::Bool(true) => 1,
                other => other.as_u64().unwrap_or(0) as u32,
            };
            grants.add_pool(proficiency_type, allowed, options);
            continue;
        }

        match value {
            Value::Bool(true) => grants
                .proficiencies
                .push((proficiency_type, canonical_name(proficiency_type, key))),
            Value::Bool(false) => {}
            other => tracing::warn!(
                source = %source,
                proficiency_type = %proficiency_type,
                key = %key,
                value = %other,
                "Skipping unrecognized proficiency key"
            ),
        }
    }
}

/// Class `startingProficiencies` armor/weapons/tools lists.
fn derive_starting_lists(rule: &RuleData, grants: &mut SourceGrants) {
    let lists = [
        (ProficiencyType::Armor, &rule.starting_proficiencies.armor),
        (ProficiencyType::Weapons, &rule.starting_proficiencies.weapons),
        (ProficiencyType::Tools, &rule.starting_proficiencies.tools),
    ];
    for (proficiency_type, list) in lists {
        for item in list {
            match item.as_str() {
                Some(raw) if !raw.trim().is_empty() => grants
                    .proficiencies
                    .push((proficiency_type, canonical_name(proficiency_type, raw))),
                _ => tracing::warn!(
                    source = %rule.name,
                    proficiency_type = %proficiency_type,
                    item = %item,
                    "Skipping non-string starting proficiency"
                ),
            }
        }
    }
}

fn derive_saving_throws(rule: &RuleData, grants: &mut SourceGrants) {
    for value in &rule.proficiency {
        match value.as_str().and_then(Ability::parse) {
            Some(ability) => grants
                .proficiencies
                .push((ProficiencyType::SavingThrows, ability.display_name().to_string())),
            None => {
                tracing::warn!(source = %rule.name, value = %value, "Skipping unknown saving throw")
            }
        }
    }
}

// =============================================================================
// Scalars
// =============================================================================

fn expand_size(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "T" => "Tiny".to_string(),
        "S" => "Small".to_string(),
        "M" => "Medium".to_string(),
        "L" => "Large".to_string(),
        "H" => "Huge".to_string(),
        "G" => "Gargantuan".to_string(),
        _ => code.trim().to_string(),
    }
}

fn derive_scalars(rule: &RuleData, grants: &mut SourceGrants) {
    grants.size = rule.size.first().map(|code| expand_size(code));

    grants.speed = match &rule.speed {
        None => None,
        Some(Value::Number(n)) => n.as_u64().map(|n| n as u32),
        Some(speed @ Value::Object(_)) => {
            speed.get("walk").and_then(Value::as_u64).map(|n| n as u32)
        }
        Some(other) => {
            tracing::warn!(source = %rule.name, speed = %other, "Skipping unrecognized speed");
            None
        }
    };

    grants.darkvision = rule.darkvision;

    for value in &rule.resist {
        match value.as_str() {
            Some(damage_type) => grants.resistances.push(damage_type.to_string()),
            None => tracing::warn!(
                source = %rule.name,
                value = %value,
                "Skipping non-string resistance"
            ),
        }
    }

    grants.hit_die = rule.hd.map(|hd| hd.faces);
}
