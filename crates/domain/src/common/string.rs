//! String normalization utilities.

/// Normalizes a name into its lookup key: trimmed and lowercased.
///
/// Names are stored case-preserving for display; comparisons use this key.
///
/// # Examples
///
/// ```
/// use charbldr_domain::common::normalize_for_lookup;
///
/// assert_eq!(normalize_for_lookup("  Sleight of Hand "), "sleight of hand");
/// assert_eq!(normalize_for_lookup("STEALTH"), "stealth");
/// ```
pub fn normalize_for_lookup(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive name equality under the lookup policy.
///
/// # Examples
///
/// ```
/// use charbldr_domain::common::eq_for_lookup;
///
/// assert!(eq_for_lookup("Animal Handling", "animal handling"));
/// assert!(!eq_for_lookup("Arcana", "Athletics"));
/// ```
pub fn eq_for_lookup(a: &str, b: &str) -> bool {
    normalize_for_lookup(a) == normalize_for_lookup(b)
}

/// Case-insensitive prefix test under the lookup policy.
///
/// # Examples
///
/// ```
/// use charbldr_domain::common::starts_with_for_lookup;
///
/// assert!(starts_with_for_lookup("Race Choice 1", "race choice"));
/// assert!(!starts_with_for_lookup("Race", "Race Choice"));
/// ```
pub fn starts_with_for_lookup(value: &str, prefix: &str) -> bool {
    normalize_for_lookup(value).starts_with(&normalize_for_lookup(prefix))
}

/// Capitalizes the first letter of every whitespace-separated word.
///
/// Used as the display fallback for rule-data keys that have no canonical spelling.
///
/// # Examples
///
/// ```
/// use charbldr_domain::common::title_case;
///
/// assert_eq!(title_case("hand crossbow"), "Hand Crossbow");
/// assert_eq!(title_case("  longsword"), "Longsword");
/// ```
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_for_lookup("\tThieves' Tools\n"), "thieves' tools");
        assert_eq!(normalize_for_lookup(""), "");
    }

    #[test]
    fn prefix_comparison_ignores_case() {
        assert!(starts_with_for_lookup("RACE CHOICE", "Race Choice"));
        assert!(starts_with_for_lookup("Background Choice 2", "background choice"));
        assert!(!starts_with_for_lookup("Subrace", "Race"));
    }

    #[test]
    fn title_case_keeps_apostrophes() {
        assert_eq!(title_case("thieves' tools"), "Thieves' Tools");
        assert_eq!(title_case(""), "");
    }
}
