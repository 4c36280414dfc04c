// src/catalogue.rs

use std::collections::HashSet;
use thiserror::Error;

/// The mandatory e-invoice fields, in report order.
pub const EINVOICE_FIELDS: &[&str] = &[
    "Supplier TIN",
    "Supplier Registration Number",
    "Supplier SST ID",
    "Supplier MSIC code",
    "Supplier business activity description",
    "E-Invoice Type",
    "E-Invoice Version",
    "E-Invoice Code",
    "Original Invoice Reference No.",
    "Invoice Date and Time",
    "Buyer TIN",
    "Buyer Contact Number",
    "Buyer SST Registration ID",
    "Buyer Registration Number",
    "Buyer Address",
    "Quantity",
    "Unit Price",
    "Tax Rate",
    "Subtotal",
    "Total excluding Tax",
    "Total Including Tax",
    "Total Payable Amount",
    "Supplier Tourism Tax Registration Number",
    "Supplier Address",
    "Supplier Contact Number",
    "Invoice Currency Code",
    "Currency Exchange Rate",
    "Digital Signature",
    "Classification",
    "Description of Product or Service",
    "Tax Type",
    "Details of Tax Exemption",
    "Amount Exempted from Tax",
    "Measurement",
];

/// Columns that may appear on an invoice line item.
pub const ITEM_COLUMNS: &[&str] = &[
    "Classification",
    "Description of Product or Service",
    "Quantity",
    "Measurement",
    "Unit Price",
    "Tax Type",
    "Tax Rate",
    "Details of Tax Exemption",
    "Amount Exempted from Tax",
    "Subtotal",
    "Total excluding Tax",
    "Total Including Tax",
    "Total Payable Amount",
];

/// Configuration-time problems with a field catalogue or its matching rules.
#[derive(Error, Debug, PartialEq)]
pub enum CatalogueError {
    #[error("catalogue field at position {0} has an empty name")]
    EmptyName(usize),

    #[error("catalogue field {0:?} is listed more than once")]
    Duplicate(String),

    #[error("alias target {0:?} is not a catalogue field")]
    UnknownAliasTarget(String),

    #[error("catalogue fields {0:?} and {1:?} are indistinguishable after folding")]
    FoldCollision(String, String),

    #[error("alias {alias:?} for {target:?} already identifies {owner:?}")]
    AliasConflict {
        alias: String,
        target: String,
        owner: String,
    },

    #[error("catalogue field {0:?} folds to an empty label")]
    Unfoldable(String),
}

/// One entry of the compliance schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MandatoryField {
    pub name: String,
    pub required: bool,
    pub position: usize,
}

/// Immutable, ordered list of mandatory fields.
#[derive(Debug, Clone)]
pub struct Catalogue {
    fields: Vec<MandatoryField>,
}

impl Catalogue {
    /// Build a catalogue from field names, rejecting blank or repeated names.
    pub fn new<I, S>(names: I) -> Result<Self, CatalogueError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut fields = Vec::new();

        for (position, name) in names.into_iter().enumerate() {
            let name: String = name.into();
            if name.trim().is_empty() {
                return Err(CatalogueError::EmptyName(position));
            }
            if !seen.insert(name.clone()) {
                return Err(CatalogueError::Duplicate(name));
            }
            fields.push(MandatoryField {
                name,
                required: true,
                position,
            });
        }

        Ok(Self { fields })
    }

    /// The built-in e-invoice catalogue.
    pub fn einvoice() -> Self {
        Self {
            fields: EINVOICE_FIELDS
                .iter()
                .enumerate()
                .map(|(position, name)| MandatoryField {
                    name: (*name).to_string(),
                    required: true,
                    position,
                })
                .collect(),
        }
    }

    pub fn fields(&self) -> &[MandatoryField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}
