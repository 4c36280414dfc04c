// src/compliance.rs

use crate::catalogue::{Catalogue, CatalogueError};
use crate::extraction::NormalizedExtractions;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").unwrap());

/// Presence record for one mandatory field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceEntry {
    #[serde(skip)]
    pub field: String,
    pub required: bool,
    pub present: bool,
    pub value: Option<String>,
    #[serde(rename = "extracted_as")]
    pub matched_label: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReduceCounts {
    pub present: usize,
    pub missing: usize,
}

/// Output of [`reduce_with`]: one entry per catalogue field, in catalogue order.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub entries: Vec<ComplianceEntry>,
    pub counts: ReduceCounts,
}

/// How extracted labels are compared with catalogue names.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LabelMatcher {
    /// Byte-for-byte equality. Near misses count as missing.
    #[default]
    Exact,
    /// Compare folded labels; each field also accepts its configured aliases.
    Folded {
        keys: HashMap<String, Vec<String>>,
    },
}

impl LabelMatcher {
    /// Build a folding matcher for `catalogue`. Aliases are keyed by catalogue name.
    pub fn folded(
        catalogue: &Catalogue,
        aliases: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, CatalogueError> {
        // Every folded key, catalogue name or alias, belongs to exactly one field.
        let mut owners: HashMap<String, &str> = HashMap::new();
        for field in catalogue.fields() {
            let key = fold_label(&field.name);
            if key.is_empty() {
                return Err(CatalogueError::Unfoldable(field.name.clone()));
            }
            if let Some(other) = owners.insert(key, &field.name) {
                return Err(CatalogueError::FoldCollision(
                    other.to_string(),
                    field.name.clone(),
                ));
            }
        }

        let mut keys: HashMap<String, Vec<String>> = catalogue
            .fields()
            .iter()
            .map(|f| (f.name.clone(), vec![fold_label(&f.name)]))
            .collect();

        for (target, alternates) in aliases {
            if !catalogue.contains(target) {
                return Err(CatalogueError::UnknownAliasTarget(target.clone()));
            }
            let Some(entry) = keys.get_mut(target) else {
                continue;
            };
            for alt in alternates {
                let key = fold_label(alt);
                if key.is_empty() {
                    continue;
                }
                match owners.get(&key) {
                    Some(&owner) if owner != target.as_str() => {
                        return Err(CatalogueError::AliasConflict {
                            alias: alt.clone(),
                            target: target.clone(),
                            owner: owner.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(key.clone(), target.as_str());
                    }
                }
                if !entry.contains(&key) {
                    entry.push(key);
                }
            }
        }

        Ok(LabelMatcher::Folded { keys })
    }

    /// Find the extracted (label, value) that satisfies `field`, if any.
    fn find<'a>(&self, field: &str, normalized: &'a NormalizedExtractions) -> Option<(&'a str, &'a str)> {
        match self {
            LabelMatcher::Exact => normalized
                .entry(field)
                .map(|lv| (lv.label.as_str(), lv.value.as_str())),
            LabelMatcher::Folded { keys } => {
                let wanted = keys.get(field)?;
                normalized
                    .iter()
                    .find(|lv| wanted.contains(&fold_label(&lv.label)))
                    .map(|lv| (lv.label.as_str(), lv.value.as_str()))
            }
        }
    }
}

/// Case-fold, drop punctuation and collapse whitespace.
pub fn fold_label(label: &str) -> String {
    let lower = label.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lower, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join the catalogue with the normalized extractions using exact matching.
#[cfg(test)]
pub fn reduce(catalogue: &Catalogue, normalized: &NormalizedExtractions) -> Reduction {
    reduce_with(catalogue, normalized, &LabelMatcher::Exact)
}

/// Join the catalogue with the normalized extractions. Every catalogue field
/// yields exactly one entry.
pub fn reduce_with(
    catalogue: &Catalogue,
    normalized: &NormalizedExtractions,
    matcher: &LabelMatcher,
) -> Reduction {
    let mut counts = ReduceCounts::default();

    let entries = catalogue
        .fields()
        .iter()
        .map(|field| {
            let hit = matcher
                .find(&field.name, normalized)
                .filter(|(_, value)| !value.trim().is_empty());

            match hit {
                Some((label, value)) => {
                    counts.present += 1;
                    ComplianceEntry {
                        field: field.name.clone(),
                        required: field.required,
                        present: true,
                        value: Some(value.to_string()),
                        matched_label: Some(label.to_string()),
                    }
                }
                None => {
                    counts.missing += 1;
                    ComplianceEntry {
                        field: field.name.clone(),
                        required: field.required,
                        present: false,
                        value: None,
                        matched_label: None,
                    }
                }
            }
        })
        .collect();

    Reduction { entries, counts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{ExtractionRecord, normalize};

    fn catalogue() -> Catalogue {
        Catalogue::new(["Supplier TIN", "Buyer TIN", "Subtotal"]).unwrap()
    }

    #[test]
    fn test_reduce_is_total_and_ordered() {
        let n = normalize(&[
            ExtractionRecord::field("Subtotal", "RM 10.00"),
            ExtractionRecord::field("Unrelated", "x"),
            ExtractionRecord::field("Supplier TIN", "C321456789120"),
        ]);
        let r = reduce(&catalogue(), &n);
        let names: Vec<_> = r.entries.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(names, ["Supplier TIN", "Buyer TIN", "Subtotal"]);
        assert_eq!(r.counts, ReduceCounts { present: 2, missing: 1 });
        assert_eq!(r.entries[0].matched_label.as_deref(), Some("Supplier TIN"));
        assert!(!r.entries[1].present);
        assert_eq!(r.entries[1].value, None);
    }

    #[test]
    fn test_exact_matching_misses_case_variants() {
        let n = normalize(&[ExtractionRecord::field("supplier tin", "C321456789120")]);
        let r = reduce(&catalogue(), &n);
        assert!(!r.entries[0].present);
        assert_eq!(r.counts.present, 0);
    }

    #[test]
    fn test_exact_matching_is_whitespace_sensitive() {
        let n = normalize(&[ExtractionRecord::field("Supplier TIN ", "C1")]);
        assert!(!reduce(&catalogue(), &n).entries[0].present);
    }

    #[test]
    fn test_empty_catalogue() {
        let cat = Catalogue::new(Vec::<String>::new()).unwrap();
        let n = normalize(&[ExtractionRecord::field("Supplier TIN", "C1")]);
        let r = reduce(&cat, &n);
        assert!(r.entries.is_empty());
        assert_eq!(r.counts, ReduceCounts::default());
    }

    #[test]
    fn test_fold_label() {
        assert_eq!(fold_label("  Supplier's  TIN: "), "suppliers tin");
        assert_eq!(fold_label("Original Invoice Reference No."), "original invoice reference no");
    }

    #[test]
    fn test_folded_matching_with_aliases() {
        let cat = catalogue();
        let mut aliases = BTreeMap::new();
        aliases.insert("Buyer TIN".to_string(), vec!["Buyer's Tax ID".to_string()]);
        let matcher = LabelMatcher::folded(&cat, &aliases).unwrap();

        let n = normalize(&[
            ExtractionRecord::field("supplier tin", "C1"),
            ExtractionRecord::field("BUYER'S TAX ID", "EI00000000010"),
        ]);
        let r = reduce_with(&cat, &n, &matcher);
        assert!(r.entries[0].present);
        assert_eq!(r.entries[0].matched_label.as_deref(), Some("supplier tin"));
        assert_eq!(r.entries[1].value.as_deref(), Some("EI00000000010"));
        assert_eq!(r.entries[1].matched_label.as_deref(), Some("BUYER'S TAX ID"));
        assert!(!r.entries[2].present);
    }

    #[test]
    fn test_folded_matcher_rejects_bad_configuration() {
        let mut aliases = BTreeMap::new();
        aliases.insert("Seller TIN".to_string(), vec!["Vendor TIN".to_string()]);
        assert_eq!(
            LabelMatcher::folded(&catalogue(), &aliases).unwrap_err(),
            CatalogueError::UnknownAliasTarget("Seller TIN".to_string())
        );

        let colliding = Catalogue::new(["Buyer TIN", "buyer tin"]).unwrap();
        assert!(matches!(
            LabelMatcher::folded(&colliding, &BTreeMap::new()),
            Err(CatalogueError::FoldCollision(_, _))
        ));
    }

    #[test]
    fn test_alias_cannot_claim_another_fields_label() {
        let cat = Catalogue::new(["Supplier TIN", "Buyer TIN"]).unwrap();
        let mut aliases = BTreeMap::new();
        aliases.insert("Buyer TIN".to_string(), vec!["Supplier TIN".to_string()]);
        assert_eq!(
            LabelMatcher::folded(&cat, &aliases).unwrap_err(),
            CatalogueError::AliasConflict {
                alias: "Supplier TIN".to_string(),
                target: "Buyer TIN".to_string(),
                owner: "Supplier TIN".to_string(),
            }
        );

        // Two fields sharing one alternate label is just as ambiguous.
        let mut aliases = BTreeMap::new();
        aliases.insert("Buyer TIN".to_string(), vec!["Tax ID".to_string()]);
        aliases.insert("Supplier TIN".to_string(), vec!["tax id".to_string()]);
        assert!(matches!(
            LabelMatcher::folded(&cat, &aliases),
            Err(CatalogueError::AliasConflict { .. })
        ));

        // Repeating a field's own name as its alias is harmless.
        let mut aliases = BTreeMap::new();
        aliases.insert("Buyer TIN".to_string(), vec!["BUYER TIN".to_string()]);
        let matcher = LabelMatcher::folded(&cat, &aliases).unwrap();
        let n = normalize(&[ExtractionRecord::field("Supplier TIN", "C1")]);
        let r = reduce_with(&cat, &n, &matcher);
        assert_eq!(r.counts, ReduceCounts { present: 1, missing: 1 });
        assert!(!r.entries[1].present);
    }

    #[test]
    fn test_punctuation_only_field_is_rejected_for_folding() {
        let cat = Catalogue::new(["Supplier TIN", "???"]).unwrap();
        assert_eq!(
            LabelMatcher::folded(&cat, &BTreeMap::new()).unwrap_err(),
            CatalogueError::Unfoldable("???".to_string())
        );
        // Exact matching still accepts it verbatim.
        let n = normalize(&[ExtractionRecord::field("-", "x")]);
        assert!(!reduce(&cat, &n).entries[1].present);
    }
}
