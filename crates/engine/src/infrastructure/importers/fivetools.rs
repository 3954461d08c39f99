//! 5etools data importer.
//!
//! Looks up race, subrace, class, subclass, background and feat definitions in
//! a 5etools data checkout and hands them over as [`RuleData`]. Entry text and
//! class starting-proficiency strings are stripped of `{@tag ...}` markup on
//! the way out.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;

use charbldr_domain::common::eq_for_lookup;

use super::fivetools_types::*;
use crate::infrastructure::ports::{ImportError, RuleData, RuleDataSource};

// Static regex pattern for cleaning 5etools formatting (compiled once)
static FIVETOOLS_TAG_REGEX: OnceLock<regex_lite::Regex> = OnceLock::new();

/// Replaces `{@tag text}` with `text` and `{@tag text|source|display}` with
/// `display` (or `text` when no display part is given).
pub fn clean_formatting(text: &str) -> String {
    let re = FIVETOOLS_TAG_REGEX.get_or_init(|| {
        regex_lite::Regex::new(r"\{@\w+\s+([^{}]*)\}")
            .expect("FIVETOOLS_TAG_REGEX pattern is invalid")
    });
    re.replace_all(text, |caps: &regex_lite::Captures<'_>| {
        let body = caps.get(1).map_or("", |m| m.as_str());
        let parts: Vec<&str> = body.split('|').collect();
        match parts.get(2).filter(|d| !d.trim().is_empty()) {
            Some(display) => display.to_string(),
            None => parts.first().copied().unwrap_or_default().to_string(),
        }
    })
    .into_owned()
}

fn clean_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = clean_formatting(s),
        Value::Array(items) => items.iter_mut().for_each(clean_value),
        Value::Object(map) => map.values_mut().for_each(clean_value),
        _ => {}
    }
}

fn cleaned(mut rule: RuleData) -> RuleData {
    let starting = &mut rule.starting_proficiencies;
    rule.entries
        .iter_mut()
        .chain(starting.armor.iter_mut())
        .chain(starting.weapons.iter_mut())
        .chain(starting.tools.iter_mut())
        .for_each(clean_value);
    rule
}

/// Picks the first full definition among `candidates`, falling back to a
/// `_copy` stub only when nothing else matches.
fn pick<'a>(candidates: impl Iterator<Item = &'a RuleData>) -> Option<&'a RuleData> {
    let mut fallback = None;
    for rule in candidates {
        if !rule.is_copy() {
            return Some(rule);
        }
        fallback.get_or_insert(rule);
    }
    if let Some(stub) = fallback {
        tracing::warn!(
            name = %stub.name,
            source = %stub.source,
            "Using _copy entry without resolving its base"
        );
    }
    fallback
}

fn describe(name: &str, source: Option<&str>) -> String {
    match source {
        Some(source) => format!("{} ({})", name, source),
        None => name.to_string(),
    }
}

/// Importer for 5etools data.
pub struct FiveToolsImporter {
    data_path: PathBuf,
}

impl FiveToolsImporter {
    /// Create a new importer pointing to the 5etools data directory.
    ///
    /// The path should point to the root of the extracted 5etools folder,
    /// e.g., `/path/to/5etools-v2.22.0`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
        }
    }

    /// Check if 5etools data exists at the configured path.
    pub async fn validate_path(&self) -> bool {
        fs::metadata(self.data_path.join("data"))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ImportError> {
        if fs::metadata(path).await.is_err() {
            return Err(ImportError::DataFileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn load_races(&self) -> Result<FiveToolsRaceFile, ImportError> {
        self.read_json(&self.data_path.join("data/races.json")).await
    }

    pub async fn load_backgrounds(&self) -> Result<FiveToolsBackgroundFile, ImportError> {
        self.read_json(&self.data_path.join("data/backgrounds.json")).await
    }

    pub async fn load_feats(&self) -> Result<FiveToolsFeatFile, ImportError> {
        self.read_json(&self.data_path.join("data/feats.json")).await
    }

    /// Loads a single class file named in `data/class/index.json`.
    ///
    /// The filename must not contain path separators or traversal sequences.
    pub async fn load_class_file(&self, filename: &str) -> Result<FiveToolsClassFile, ImportError> {
        // Prevent path traversal attacks
        if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
            return Err(ImportError::InvalidFilename(filename.to_string()));
        }
        self.read_json(&self.data_path.join("data/class").join(filename)).await
    }

    /// Loads every class file listed in the class index.
    pub async fn load_classes(&self) -> Result<Vec<FiveToolsClassFile>, ImportError> {
        let index: FiveToolsIndex = self
            .read_json(&self.data_path.join("data/class/index.json"))
            .await?;

        let mut files = Vec::new();
        for (source, filename) in index {
            // Only class files, not fluff
            if !filename.starts_with("class-") || filename.contains("fluff") {
                continue;
            }
            match self.load_class_file(&filename).await {
                Ok(file) => files.push(file),
                Err(ImportError::DataFileNotFound(path)) => {
                    tracing::warn!(
                        source = %source,
                        path = %path.display(),
                        "Class file listed in index is missing"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl RuleDataSource for FiveToolsImporter {
    async fn find_race(&self, name: &str, source: Option<&str>) -> Result<RuleData, ImportError> {
        let races = self.load_races().await?;
        pick(races.race.iter().filter(|r| r.matches(name, source)))
            .cloned()
            .map(cleaned)
            .ok_or_else(|| ImportError::not_found("Race", describe(name, source)))
    }

    async fn find_subrace(&self, race: &RuleData, name: &str) -> Result<RuleData, ImportError> {
        let races = self.load_races().await?;
        pick(races.subrace.iter().filter(|s| {
            eq_for_lookup(&s.name, name)
                && s.race_name.as_deref().is_some_and(|n| eq_for_lookup(n, &race.name))
                && s.race_source.as_deref().map_or(true, |src| eq_for_lookup(src, &race.source))
        }))
        .cloned()
        .map(cleaned)
        .ok_or_else(|| ImportError::not_found("Subrace", format!("{} {}", name, race.name)))
    }

    async fn find_class(&self, name: &str, source: Option<&str>) -> Result<RuleData, ImportError> {
        for file in self.load_classes().await? {
            if let Some(class) = pick(file.class.iter().filter(|c| c.matches(name, source))) {
                return Ok(cleaned(class.clone()));
            }
        }
        Err(ImportError::not_found("Class", describe(name, source)))
    }

    async fn find_subclass(&self, class: &RuleData, name: &str) -> Result<RuleData, ImportError> {
        for file in self.load_classes().await? {
            let found = pick(file.subclass.iter().filter(|s| {
                (eq_for_lookup(&s.name, name) || eq_for_lookup(s.display_sub_name(), name))
                    && s.class_name.as_deref().is_some_and(|n| eq_for_lookup(n, &class.name))
            }));
            if let Some(subclass) = found {
                return Ok(cleaned(subclass.clone()));
            }
        }
        Err(ImportError::not_found("Subclass", format!("{} {}", name, class.name)))
    }

    async fn find_background(
        &self,
        name: &str,
        source: Option<&str>,
    ) -> Result<RuleData, ImportError> {
        let backgrounds = self.load_backgrounds().await?;
        pick(backgrounds.background.iter().filter(|b| b.matches(name, source)))
            .cloned()
            .map(cleaned)
            .ok_or_else(|| ImportError::not_found("Background", describe(name, source)))
    }

    async fn find_feat(&self, name: &str, source: Option<&str>) -> Result<RuleData, ImportError> {
        let feats = self.load_feats().await?;
        pick(feats.feat.iter().filter(|f| f.matches(name, source)))
            .cloned()
            .map(cleaned)
            .ok_or_else(|| ImportError::not_found("Feat", describe(name, source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, relative: &str, value: Value) {
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, serde_json::to_string(&value).unwrap()).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "data/races.json",
            json!({
                "race": [
                    { "name": "Dwarf", "source": "PHB", "speed": 25, "darkvision": 60,
                      "entries": [{ "type": "entries", "name": "Dwarven Resilience",
                                    "entries": ["Resist {@damage poison} damage."] }] },
                    { "name": "Dwarf", "source": "MPMM",
                      "_copy": { "name": "Dwarf", "source": "PHB" } },
                    { "name": "Human", "source": "PHB" }
                ],
                "subrace": [
                    { "name": "Hill", "source": "PHB", "raceName": "Dwarf", "raceSource": "PHB",
                      "ability": [{ "wis": 1 }] },
                    { "name": "Variant", "source": "PHB", "raceName": "Human", "raceSource": "PHB" }
                ]
            }),
        );
        write(
            &dir,
            "data/class/index.json",
            json!({ "PHB": "class-fighter.json", "fluff": "fluff-class-fighter.json" }),
        );
        write(
            &dir,
            "data/class/class-fighter.json",
            json!({
                "class": [{ "name": "Fighter", "source": "PHB",
                            "hd": { "number": 1, "faces": 10 } }],
                "subclass": [{ "name": "Champion", "shortName": "Champion", "source": "PHB",
                               "className": "Fighter", "classSource": "PHB" }]
            }),
        );
        write(
            &dir,
            "data/backgrounds.json",
            json!({
                "background": [{
                    "name": "Acolyte",
                    "source": "PHB",
                    "skillProficiencies": [{ "insight": true, "religion": true }]
                }]
            }),
        );
        write(
            &dir,
            "data/feats.json",
            json!({ "feat": [{ "name": "Alert", "source": "PHB" }] }),
        );
        dir
    }

    mod markup {
        use super::*;

        #[test]
        fn strips_simple_and_display_tags() {
            assert_eq!(
                clean_formatting("Resist {@damage poison} damage."),
                "Resist poison damage."
            );
            assert_eq!(
                clean_formatting("Cast {@spell light|phb} or {@item longsword|phb|a blade}."),
                "Cast light or a blade."
            );
            assert_eq!(clean_formatting("No markup here."), "No markup here.");
        }
    }

    mod lookups {
        use super::*;

        #[tokio::test]
        async fn finds_race_case_insensitively_and_prefers_full_entries() {
            let dir = fixture();
            let importer = FiveToolsImporter::new(dir.path());

            let dwarf = importer.find_race("dwarf", None).await.unwrap();
            assert_eq!(dwarf.source, "PHB");
            assert_eq!(dwarf.darkvision, Some(60));
            assert_eq!(
                dwarf.entries[0]["entries"][0],
                json!("Resist poison damage.")
            );
        }

        #[tokio::test]
        async fn finds_subrace_of_race() {
            let dir = fixture();
            let importer = FiveToolsImporter::new(dir.path());
            let dwarf = importer.find_race("Dwarf", Some("PHB")).await.unwrap();

            let hill = importer.find_subrace(&dwarf, "hill").await.unwrap();
            assert_eq!(hill.ability.len(), 1);
            assert!(importer.find_subrace(&dwarf, "Variant").await.is_err());
        }

        #[tokio::test]
        async fn finds_class_and_subclass_through_index() {
            let dir = fixture();
            let importer = FiveToolsImporter::new(dir.path());
            let fighter = importer.find_class("Fighter", Some("phb")).await.unwrap();
            assert_eq!(fighter.hd.map(|h| h.faces), Some(10));

            let champion = importer.find_subclass(&fighter, "champion").await.unwrap();
            assert_eq!(champion.class_name.as_deref(), Some("Fighter"));
        }

        #[tokio::test]
        async fn finds_background_and_feat() {
            let dir = fixture();
            let importer = FiveToolsImporter::new(dir.path());
            assert!(importer.find_background("ACOLYTE", None).await.is_ok());
            assert!(importer.find_feat("alert", Some("PHB")).await.is_ok());
        }

        #[tokio::test]
        async fn missing_entries_are_not_found() {
            let dir = fixture();
            let importer = FiveToolsImporter::new(dir.path());
            let err = importer.find_race("Tabaxi", None).await.unwrap_err();
            assert!(matches!(err, ImportError::NotFound { kind: "Race", .. }));
        }
    }

    mod files {
        use super::*;

        #[tokio::test]
        async fn missing_data_directory_is_reported() {
            let dir = TempDir::new().unwrap();
            let importer = FiveToolsImporter::new(dir.path());
            assert!(!importer.validate_path().await);
            assert!(matches!(
                importer.find_background("Acolyte", None).await,
                Err(ImportError::DataFileNotFound(_))
            ));
        }

        #[tokio::test]
        async fn rejects_path_traversal_in_class_filenames() {
            let dir = fixture();
            let importer = FiveToolsImporter::new(dir.path());
            for bad in ["../secrets.json", "a/b.json", "a\\b.json"] {
                assert!(matches!(
                    importer.load_class_file(bad).await,
                    Err(ImportError::InvalidFilename(_))
                ));
            }
        }

        #[tokio::test]
        async fn malformed_json_is_a_json_error() {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("data")).unwrap();
            std::fs::write(dir.path().join("data/feats.json"), "{ not json").unwrap();
            let importer = FiveToolsImporter::new(dir.path());
            assert!(matches!(
                importer.find_feat("Alert", None).await,
                Err(ImportError::Json(_))
            ));
        }
    }
}
