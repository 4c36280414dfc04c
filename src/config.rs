use crate::catalogue::{Catalogue, CatalogueError};
use crate::compliance::LabelMatcher;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::{fs, path::Path};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalogue: CatalogueSection,
    #[serde(default)]
    pub matching: MatchingSection,
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "reports/reports.db".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogueSection {
    /// Overrides the built-in e-invoice field list when set.
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Folded,
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchingSection {
    #[serde(default)]
    pub mode: MatchMode,
    /// Catalogue field name -> alternate labels accepted in folded mode.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalogue: CatalogueSection::default(),
            matching: MatchingSection::default(),
            db_path: default_db_path(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`Config::load`], but a missing file means "use the defaults".
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No config file, using built-in catalogue");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Build the catalogue and matcher. Any problem here is a startup failure.
    pub fn build_matching(&self) -> Result<(Catalogue, LabelMatcher), CatalogueError> {
        let catalogue = match &self.catalogue.fields {
            Some(fields) => Catalogue::new(fields.iter().cloned())?,
            None => Catalogue::einvoice(),
        };

        let matcher = match self.matching.mode {
            MatchMode::Exact => {
                if !self.matching.aliases.is_empty() {
                    warn!(
                        aliases = self.matching.aliases.len(),
                        "Aliases are ignored in exact matching mode"
                    );
                }
                LabelMatcher::Exact
            }
            MatchMode::Folded => LabelMatcher::folded(&catalogue, &self.matching.aliases)?,
        };

        if catalogue.is_empty() {
            warn!("Catalogue is empty, every report will be 0/0");
        }
        info!(
            fields = catalogue.len(),
            mode = ?self.matching.mode,
            "Catalogue loaded"
        );
        Ok((catalogue, matcher))
    }
}
