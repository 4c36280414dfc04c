// src/report.rs

use crate::compliance::{ComplianceEntry, Reduction};
use crate::extraction::NormalizedExtractions;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Aggregate counters for a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplianceSummary {
    pub total: usize,
    pub present_count: usize,
    pub missing_count: usize,
    pub completion_percentage: f64,
    pub total_distinct_extracted_labels: usize,
}

/// Final per-field breakdown plus summary. Entries serialize as a map keyed
/// by field name, in catalogue order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    #[serde(serialize_with = "entries_as_map")]
    pub entries: Vec<ComplianceEntry>,
    pub summary: ComplianceSummary,
}

fn entries_as_map<S: Serializer>(entries: &[ComplianceEntry], s: S) -> Result<S::Ok, S::Error> {
    let mut map = s.serialize_map(Some(entries.len()))?;
    for entry in entries {
        map.serialize_entry(&entry.field, entry)?;
    }
    map.end()
}

/// `present / total * 100` rounded to two decimals; `0.0` for an empty catalogue.
///
/// Halves round away from zero (`f64::round`), so `1/160` gives `0.63`.
/// Ties cannot occur with the built-in catalogue.
pub fn completion_percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = present as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Package a reduction into a self-contained report.
pub fn assemble(reduction: Reduction, normalized: &NormalizedExtractions) -> ComplianceReport {
    let total = reduction.entries.len();
    let present_count = reduction.entries.iter().filter(|e| e.present).count();

    ComplianceReport {
        summary: ComplianceSummary {
            total,
            present_count,
            missing_count: total - present_count,
            completion_percentage: completion_percentage(present_count, total),
            total_distinct_extracted_labels: normalized.len(),
        },
        entries: reduction.entries,
    }
}

impl ComplianceReport {
    #[cfg(test)]
    pub fn entry(&self, field: &str) -> Option<&ComplianceEntry> {
        self.entries.iter().find(|e| e.field == field)
    }

    pub fn missing_fields(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.present)
            .map(|e| e.field.as_str())
    }

    /// One-line outcome, e.g. `Found 12/34 mandatory fields (35.29%)`.
    pub fn headline(&self) -> String {
        let pct = self.summary.completion_percentage;
        let pct = if pct.fract() == 0.0 {
            format!("{pct:.1}")
        } else {
            pct.to_string()
        };
        format!(
            "Found {}/{} mandatory fields ({pct}%)",
            self.summary.present_count, self.summary.total
        )
    }
}
