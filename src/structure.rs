// src/structure.rs

use crate::catalogue::ITEM_COLUMNS;
use crate::extraction::ExtractionRecord;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").unwrap());

/// Section-tagged fields grouped the way an invoice is laid out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredInvoice {
    pub supplier: BTreeMap<String, String>,
    pub buyer: BTreeMap<String, String>,
    pub invoice: BTreeMap<String, String>,
    pub items: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub issues: Vec<String>,
}

/// Group `field` records by their section tag and collect item rows.
/// Untagged records are not placed anywhere.
pub fn group_sections(records: &[ExtractionRecord]) -> StructuredInvoice {
    let mut out = StructuredInvoice::default();

    for record in records {
        match record {
            ExtractionRecord::Field {
                label,
                value,
                section: Some(section),
            } => {
                let target = match section.as_str() {
                    "supplier" => &mut out.supplier,
                    "buyer" => &mut out.buyer,
                    "invoice" => &mut out.invoice,
                    _ => continue,
                };
                if !value.trim().is_empty() {
                    target.entry(label.clone()).or_insert_with(|| value.clone());
                }
            }
            ExtractionRecord::LineItem {
                section: Some(section),
                columns,
            } if section == "items" => {
                let row: BTreeMap<String, String> = columns
                    .iter()
                    .filter(|(k, v)| ITEM_COLUMNS.contains(&k.as_str()) && !v.trim().is_empty())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if !row.is_empty() {
                    out.items.push(row);
                }
            }
            _ => {}
        }
    }

    out
}

/// Parse the numeric part of an amount such as `RM 65,000.00`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let m = AMOUNT.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}

/// Cross-field sanity checks on the grouped sections.
pub fn validate_sections(structured: &StructuredInvoice) -> ValidationOutcome {
    let mut issues = Vec::new();

    if !structured.supplier.contains_key("Supplier TIN") {
        issues.push("Missing Supplier TIN".to_string());
    }
    if !structured.buyer.contains_key("Buyer TIN") {
        issues.push("Missing Buyer TIN".to_string());
    }

    let totals: Vec<f64> = structured
        .items
        .iter()
        .filter_map(|row| row.get("Total Payable Amount"))
        .filter_map(|v| parse_amount(v))
        .collect();
    if !totals.is_empty()
        && structured.invoice.contains_key("Invoice Currency Code")
        && totals.iter().sum::<f64>() <= 0.0
    {
        issues.push("Invoice totals look invalid".to_string());
    }

    ValidationOutcome {
        ok: issues.is_empty(),
        issues,
    }
}
