use super::ExtractionRecord;
use std::collections::HashMap;
use tracing::debug;

/// One surviving (label, value) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelValue {
    pub label: String,
    pub value: String,
}

/// Deduplicated label → value map, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedExtractions {
    entries: Vec<LabelValue>,
    index: HashMap<String, usize>,
    /// Values dropped because they were blank.
    pub blank: usize,
    /// Later occurrences of a label that was already taken.
    pub duplicates: usize,
}

impl NormalizedExtractions {
    /// Exact, case-sensitive lookup.
    pub fn entry(&self, label: &str) -> Option<&LabelValue> {
        self.index.get(label).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelValue> {
        self.entries.iter()
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // First non-blank value for a label wins; later ones are only counted.
    fn offer(&mut self, label: &str, value: &str) {
        if value.trim().is_empty() {
            self.blank += 1;
            return;
        }
        if self.index.contains_key(label) {
            debug!(label, ignored = value, "Duplicate label, keeping first value");
            self.duplicates += 1;
            return;
        }
        self.index.insert(label.to_string(), self.entries.len());
        self.entries.push(LabelValue {
            label: label.to_string(),
            value: value.to_string(),
        });
    }
}

/// Reduce extraction records to one value per label.
///
/// Plain fields contribute their label directly; line items contribute each
/// of their columns, so a `Quantity` column satisfies the `Quantity` field.
pub fn normalize(records: &[ExtractionRecord]) -> NormalizedExtractions {
    let mut out = NormalizedExtractions::default();

    for record in records {
        match record {
            ExtractionRecord::Field { label, value, .. } => out.offer(label, value),
            ExtractionRecord::LineItem { columns, .. } => {
                for (column, value) in columns {
                    out.offer(column, value);
                }
            }
        }
    }

    out
}
