//! Canonical option lists used to populate "any"/"anyStandard" choice pools
//! and to map raw rule-data keys onto display spellings.

use crate::common::{normalize_for_lookup, title_case};
use crate::value_objects::{Ability, ProficiencyType};

/// All 18 skills.
pub const SKILLS: &[&str] = &[
    "Acrobatics",
    "Animal Handling",
    "Arcana",
    "Athletics",
    "Deception",
    "History",
    "Insight",
    "Intimidation",
    "Investigation",
    "Medicine",
    "Nature",
    "Perception",
    "Performance",
    "Persuasion",
    "Religion",
    "Sleight of Hand",
    "Stealth",
    "Survival",
];

/// Standard languages (the `anyStandard` pool).
pub const STANDARD_LANGUAGES: &[&str] = &[
    "Common", "Dwarvish", "Elvish", "Giant", "Gnomish", "Goblin", "Halfling", "Orc",
];

/// Exotic languages.
pub const EXOTIC_LANGUAGES: &[&str] = &[
    "Abyssal",
    "Celestial",
    "Deep Speech",
    "Draconic",
    "Infernal",
    "Primordial",
    "Sylvan",
    "Undercommon",
];

pub const ARTISANS_TOOLS: &[&str] = &[
    "Alchemist's Supplies",
    "Brewer's Supplies",
    "Calligrapher's Supplies",
    "Carpenter's Tools",
    "Cartographer's Tools",
    "Cobbler's Tools",
    "Cook's Utensils",
    "Glassblower's Tools",
    "Jeweler's Tools",
    "Leatherworker's Tools",
    "Mason's Tools",
    "Painter's Supplies",
    "Potter's Tools",
    "Smith's Tools",
    "Tinker's Tools",
    "Weaver's Tools",
    "Woodcarver's Tools",
];

pub const MUSICAL_INSTRUMENTS: &[&str] = &[
    "Bagpipes", "Drum", "Dulcimer", "Flute", "Lute", "Lyre", "Horn", "Pan Flute", "Shawm", "Viol",
];

pub const GAMING_SETS: &[&str] = &[
    "Dice Set",
    "Dragonchess Set",
    "Playing Card Set",
    "Three-Dragon Ante Set",
];

pub const OTHER_TOOLS: &[&str] = &[
    "Disguise Kit",
    "Forgery Kit",
    "Herbalism Kit",
    "Navigator's Tools",
    "Poisoner's Kit",
    "Thieves' Tools",
    "Vehicles (Land)",
    "Vehicles (Water)",
];

/// Standard then exotic languages.
pub fn all_languages() -> Vec<&'static str> {
    STANDARD_LANGUAGES
        .iter()
        .chain(EXOTIC_LANGUAGES)
        .copied()
        .collect()
}

/// Every tool in the catalog.
pub fn all_tools() -> Vec<&'static str> {
    ARTISANS_TOOLS
        .iter()
        .chain(MUSICAL_INSTRUMENTS)
        .chain(GAMING_SETS)
        .chain(OTHER_TOOLS)
        .copied()
        .collect()
}

/// The full option list offered by an unrestricted ("any") choice of this type.
pub fn any_options(proficiency_type: ProficiencyType) -> Vec<String> {
    let names: Vec<&str> = match proficiency_type {
        ProficiencyType::Skills => SKILLS.to_vec(),
        ProficiencyType::Languages => all_languages(),
        ProficiencyType::Tools => all_tools(),
        ProficiencyType::SavingThrows => Ability::ALL.iter().map(|a| a.display_name()).collect(),
        ProficiencyType::Armor | ProficiencyType::Weapons => Vec::new(),
    };
    names.into_iter().map(str::to_string).collect()
}

/// Maps a raw rule-data key onto its display spelling.
///
/// Strips a `|source` suffix (`"longsword|phb"`), then matches the type's catalog
/// case-insensitively; unknown names fall back to title case.
pub fn canonical_name(proficiency_type: ProficiencyType, raw: &str) -> String {
    let base = raw.split('|').next().unwrap_or(raw).trim();
    let key = normalize_for_lookup(base);

    let catalog: Vec<&str> = match proficiency_type {
        ProficiencyType::Skills => SKILLS.to_vec(),
        ProficiencyType::Languages => all_languages(),
        ProficiencyType::Tools => all_tools(),
        ProficiencyType::SavingThrows => {
            return Ability::parse(base)
                .map(|a| a.display_name().to_string())
                .unwrap_or_else(|| title_case(base));
        }
        ProficiencyType::Armor => {
            return match key.as_str() {
                "light" => "Light Armor".to_string(),
                "medium" => "Medium Armor".to_string(),
                "heavy" => "Heavy Armor".to_string(),
                "shield" | "shields" => "Shields".to_string(),
                _ => title_case(base),
            };
        }
        ProficiencyType::Weapons => {
            return match key.as_str() {
                "simple" => "Simple Weapons".to_string(),
                "martial" => "Martial Weapons".to_string(),
                _ => title_case(base),
            };
        }
    };

    catalog
        .into_iter()
        .find(|name| normalize_for_lookup(name) == key)
        .map(str::to_string)
        .unwrap_or_else(|| title_case(base))
}
