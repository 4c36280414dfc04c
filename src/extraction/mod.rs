// src/extraction/mod.rs

mod normalize;

pub use normalize::{NormalizedExtractions, normalize};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::Path};
use tracing::debug;

/// A record exactly as the extraction service emits it. Every field is
/// optional and untyped so that one bad record never sinks a whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub extraction_class: Option<Value>,
    #[serde(default)]
    pub extraction_text: Option<Value>,
    #[serde(default)]
    pub attributes: Option<Value>,
}

/// A validated extraction record.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionRecord {
    /// A single labelled value, e.g. `Supplier TIN = C321456789120`.
    Field {
        label: String,
        value: String,
        section: Option<String>,
    },
    /// One row of the invoice item table.
    LineItem {
        section: Option<String>,
        columns: Vec<(String, String)>,
    },
}

impl ExtractionRecord {
    #[cfg(test)]
    pub fn field(label: &str, value: &str) -> Self {
        ExtractionRecord::Field {
            label: label.to_string(),
            value: value.to_string(),
            section: None,
        }
    }

    /// Classify a raw record. Returns `None` when it lacks a usable label or value.
    pub fn from_raw(raw: &RawExtraction) -> Option<Self> {
        let class = raw.extraction_class.as_ref()?.as_str()?;
        let attrs = raw.attributes.as_ref().and_then(Value::as_object);
        let section = attrs
            .and_then(|a| a.get("section"))
            .and_then(Value::as_str)
            .map(repair_text);

        if class == "line_item" {
            let columns: Vec<(String, String)> = attrs
                .and_then(|a| a.get("columns"))
                .and_then(Value::as_object)
                .map(|cols| {
                    cols.iter()
                        .filter_map(|(k, v)| Some((repair_text(k), repair_text(v.as_str()?))))
                        .collect()
                })
                .unwrap_or_default();
            return Some(ExtractionRecord::LineItem { section, columns });
        }

        let value = raw.extraction_text.as_ref()?.as_str()?;
        let label = match attrs.and_then(|a| a.get("field_name")).and_then(Value::as_str) {
            Some(name) if class == "field" => name,
            _ => class,
        };
        if label.is_empty() {
            return None;
        }

        Some(ExtractionRecord::Field {
            label: repair_text(label),
            value: repair_text(value),
            section,
        })
    }
}

/// Repair the UTF-8-read-as-CP1252 apostrophe that PDF text layers produce.
fn repair_text(s: &str) -> String {
    s.replace("â€™", "'")
}

/// Records recovered from one extraction payload.
#[derive(Debug, Clone, Default)]
pub struct ExtractionBatch {
    pub records: Vec<ExtractionRecord>,
    /// Entries that were not objects or lacked a label/value.
    pub malformed: usize,
}

/// Read an extraction payload from disk (see [`parse_records`]).
pub fn load_records(path: impl AsRef<Path>) -> Result<ExtractionBatch, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    parse_records(&content)
}

/// Parse a JSON array of records, an object with an `extractions` array,
/// or JSON Lines where each line is either of those.
pub fn parse_records(content: &str) -> Result<ExtractionBatch, Box<dyn std::error::Error>> {
    let mut raw = Vec::new();

    match serde_json::from_str::<Value>(content) {
        Ok(doc) => collect_raw(doc, &mut raw)?,
        Err(whole_err) => {
            let mut lines = content.lines().filter(|l| !l.trim().is_empty()).peekable();
            if lines.peek().is_none() {
                return Err(format!("Empty extraction payload: {whole_err}").into());
            }
            for (n, line) in lines.enumerate() {
                let doc: Value = serde_json::from_str(line)
                    .map_err(|e| format!("Invalid JSON on line {}: {e}", n + 1))?;
                collect_raw(doc, &mut raw)?;
            }
        }
    }

    let mut batch = ExtractionBatch::default();
    for value in raw {
        // serde would happily map a JSON array onto the struct by position.
        let record = value
            .is_object()
            .then(|| serde_json::from_value::<RawExtraction>(value).ok())
            .flatten()
            .and_then(|r| ExtractionRecord::from_raw(&r));
        match record {
            Some(r) => batch.records.push(r),
            None => {
                debug!("Skipping malformed extraction record");
                batch.malformed += 1;
            }
        }
    }
    Ok(batch)
}

fn collect_raw(doc: Value, out: &mut Vec<Value>) -> Result<(), Box<dyn std::error::Error>> {
    match doc {
        Value::Array(items) => {
            for item in items {
                if item.get("extractions").is_some() {
                    collect_raw(item, out)?;
                } else {
                    out.push(item);
                }
            }
            Ok(())
        }
        Value::Object(mut obj) => match obj.remove("extractions") {
            Some(Value::Null) => Ok(()),
            Some(inner) => collect_raw(inner, out),
            None => {
                out.push(Value::Object(obj));
                Ok(())
            }
        },
        other => Err(format!("Expected extraction records, found {other}").into()),
    }
}
