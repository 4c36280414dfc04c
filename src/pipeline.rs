// src/pipeline.rs

use crate::catalogue::Catalogue;
use crate::compliance::{LabelMatcher, reduce_with};
use crate::extraction::{self, ExtractionBatch, ExtractionRecord, normalize};
use crate::report::{ComplianceReport, assemble};
use crate::structure::{StructuredInvoice, ValidationOutcome, group_sections, validate_sections};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Catalogue plus matching rules, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Reconciler {
    catalogue: Catalogue,
    matcher: LabelMatcher,
}

impl Reconciler {
    pub fn new(catalogue: Catalogue, matcher: LabelMatcher) -> Self {
        Self { catalogue, matcher }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// normalize → reduce → assemble.
    pub fn reconcile(&self, records: &[ExtractionRecord]) -> ComplianceReport {
        let normalized = normalize(records);
        if normalized.is_empty() {
            debug!("No usable extraction values");
        }
        if normalized.duplicates > 0 || normalized.blank > 0 {
            info!(
                duplicates = normalized.duplicates,
                blank = normalized.blank,
                "Dropped extraction values"
            );
        }
        let reduction = reduce_with(&self.catalogue, &normalized, &self.matcher);
        assemble(reduction, &normalized)
    }
}

/// Everything reported back for one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub filename: String,
    pub summary: String,
    pub structured_data: ComplianceReport,
    pub sections: StructuredInvoice,
    pub validation: ValidationOutcome,
    pub extractions: usize,
    pub malformed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_error: Option<String>,
}

/// Reconcile one document. An upstream failure degrades to an empty
/// extraction list, so the result always carries a full report.
pub fn reconcile_document(
    filename: &str,
    upstream: Result<ExtractionBatch, Box<dyn std::error::Error>>,
    reconciler: &Reconciler,
) -> DocumentResult {
    let span = tracing::info_span!("reconcile", filename = %filename);
    let _guard = span.enter();

    let (batch, upstream_error) = match upstream {
        Ok(batch) => (batch, None),
        Err(e) => {
            warn!(error = %e, "Extraction unavailable, reporting every field as missing");
            (ExtractionBatch::default(), Some(e.to_string()))
        }
    };

    let report = reconciler.reconcile(&batch.records);
    let sections = group_sections(&batch.records);
    let validation = validate_sections(&sections);

    info!(
        filled = report.summary.present_count,
        total = report.summary.total,
        completion = report.summary.completion_percentage,
        records = batch.records.len(),
        malformed = batch.malformed,
        issues = validation.issues.len(),
        "Reconciliation result"
    );

    debug!(missing = ?report.missing_fields().collect::<Vec<_>>(), "Missing fields");

    DocumentResult {
        filename: filename.to_string(),
        summary: report.headline(),
        structured_data: report,
        sections,
        validation,
        extractions: batch.records.len(),
        malformed: batch.malformed,
        upstream_error,
    }
}

/// Load and reconcile each file independently; results keep input order.
pub async fn reconcile_files(
    paths: Vec<PathBuf>,
    reconciler: Arc<Reconciler>,
) -> Result<Vec<DocumentResult>, Box<dyn std::error::Error>> {
    let mut tasks = JoinSet::new();

    for (idx, path) in paths.into_iter().enumerate() {
        let reconciler = Arc::clone(&reconciler);
        tasks.spawn_blocking(move || {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let upstream = extraction::load_records(&path);
            (idx, reconcile_document(&filename, upstream, &reconciler))
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        results.push(joined?);
    }
    results.sort_by_key(|(idx, _)| *idx);

    Ok(results.into_iter().map(|(_, r)| r).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::parse_records;
    use std::io::Write;

    fn scenario_reconciler() -> Reconciler {
        let catalogue = Catalogue::new(["Supplier TIN", "Buyer TIN", "Subtotal"]).unwrap();
        Reconciler::new(catalogue, LabelMatcher::Exact)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let batch = parse_records(
            r#"[
                {"extraction_class": "Supplier TIN", "extraction_text": "C321456789120"},
                {"extraction_class": "Subtotal", "extraction_text": ""}
            ]"#,
        )
        .unwrap();
        let result = reconcile_document("inv.json", Ok(batch), &scenario_reconciler());
        let report = &result.structured_data;

        let supplier = report.entry("Supplier TIN").unwrap();
        assert!(supplier.present);
        assert_eq!(supplier.value.as_deref(), Some("C321456789120"));
        for field in ["Buyer TIN", "Subtotal"] {
            let entry = report.entry(field).unwrap();
            assert!(!entry.present);
            assert_eq!(entry.value, None);
        }
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.present_count, 1);
        assert_eq!(report.summary.missing_count, 2);
        assert_eq!(report.summary.completion_percentage, 33.33);
        assert_eq!(result.summary, "Found 1/3 mandatory fields (33.33%)");
        assert!(result.upstream_error.is_none());
    }

    #[test]
    fn test_duplicate_labels_resolve_to_first() {
        let records = [
            ExtractionRecord::field("Supplier TIN", "C321456789120"),
            ExtractionRecord::field("Supplier TIN", "C000000000001"),
        ];
        let report = scenario_reconciler().reconcile(&records);
        let supplier = report.entry("Supplier TIN").unwrap();
        assert!(supplier.present);
        assert_eq!(supplier.value.as_deref(), Some("C321456789120"));
        assert_eq!(
            report.entries.iter().filter(|e| e.field == "Supplier TIN").count(),
            1
        );
    }

    #[test]
    fn test_upstream_failure_yields_all_missing_report() {
        let result = reconcile_document(
            "broken.pdf",
            Err("extraction service timed out".into()),
            &Reconciler::new(Catalogue::einvoice(), LabelMatcher::Exact),
        );
        let summary = &result.structured_data.summary;
        assert_eq!(summary.present_count, 0);
        assert_eq!(summary.missing_count, summary.total);
        assert_eq!(summary.completion_percentage, 0.0);
        assert!(result.structured_data.entries.iter().all(|e| !e.present && e.value.is_none()));
        assert_eq!(result.upstream_error.as_deref(), Some("extraction service timed out"));
        assert!(!result.validation.ok);
    }

    #[test]
    fn test_completion_stays_in_range() {
        let reconciler = Reconciler::new(Catalogue::einvoice(), LabelMatcher::Exact);
        let all: Vec<_> = crate::catalogue::EINVOICE_FIELDS
            .iter()
            .map(|f| ExtractionRecord::field(f, "x"))
            .collect();
        for n in [0, 1, 7, all.len()] {
            let s = reconciler.reconcile(&all[..n]).summary;
            assert!((0.0..=100.0).contains(&s.completion_percentage));
            assert_eq!(s.present_count + s.missing_count, s.total);
            assert_eq!(s.present_count, n);
        }
    }

    #[tokio::test]
    async fn test_reconcile_files_keeps_order_and_degrades() {
        let dir = std::env::temp_dir().join(format!("einvoice_check_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.json");
        let mut f = std::fs::File::create(&good).unwrap();
        writeln!(f, r#"[{{"extraction_class": "Buyer TIN", "extraction_text": "EI00000000010"}}]"#).unwrap();
        let missing = dir.join("missing.json");

        let results = reconcile_files(
            vec![missing.clone(), good.clone()],
            Arc::new(scenario_reconciler()),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].filename, "missing.json");
        assert!(results[0].upstream_error.is_some());
        assert_eq!(results[0].structured_data.summary.present_count, 0);
        assert_eq!(results[1].filename, "good.json");
        assert_eq!(results[1].structured_data.summary.present_count, 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
