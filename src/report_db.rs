use crate::report::ComplianceReport;
use rusqlite::{Connection, Result as SqliteResult, params};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

pub struct ReportStore {
    conn: Connection,
}

#[derive(Debug)]
pub struct StoredReport {
    pub uid: String,
    pub filename: String,
    pub fields_present: usize,
    pub fields_total: usize,
    pub completion_percentage: f64,
    pub report_json: String,
    pub created_at: String,
}

impl ReportStore {
    /// Open (or create) the report database.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS reports (
                uid TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                fields_present INTEGER NOT NULL,
                fields_total INTEGER NOT NULL,
                completion_percentage REAL NOT NULL,
                report_json TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reports_filename ON reports(filename)",
            [],
        )?;

        info!("Report database initialized");
        Ok(Self { conn })
    }

    /// Content-addressed id: the same file producing the same report maps to one row.
    pub fn generate_uid(filename: &str, report_json: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(filename.as_bytes());
        hasher.update(report_json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Insert a report, or refresh it if the same uid was stored before.
    pub fn upsert_report(
        &self,
        filename: &str,
        report: &ComplianceReport,
    ) -> Result<String, Box<dyn std::error::Error>> {
        let report_json = serde_json::to_string(report)?;
        let uid = Self::generate_uid(filename, &report_json);

        self.conn.execute(
            "INSERT INTO reports
                (uid, filename, fields_present, fields_total, completion_percentage, report_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(uid) DO UPDATE SET
                created_at = CURRENT_TIMESTAMP",
            params![
                uid,
                filename,
                report.summary.present_count,
                report.summary.total,
                report.summary.completion_percentage,
                report_json,
            ],
        )?;
        info!(uid = %uid, filename = %filename, "Report stored");
        Ok(uid)
    }

    fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredReport> {
        Ok(StoredReport {
            uid: row.get(0)?,
            filename: row.get(1)?,
            fields_present: row.get(2)?,
            fields_total: row.get(3)?,
            completion_percentage: row.get(4)?,
            report_json: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn get_report(&self, uid: &str) -> SqliteResult<Option<StoredReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT uid, filename, fields_present, fields_total, completion_percentage, report_json, created_at
             FROM reports
             WHERE uid = ?1",
        )?;
        let mut rows = stmt.query(params![uid])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_report(row)?)),
            None => Ok(None),
        }
    }

    /// Most recently stored reports first.
    pub fn recent_reports(&self, limit: usize) -> SqliteResult<Vec<StoredReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT uid, filename, fields_present, fields_total, completion_percentage, report_json, created_at
             FROM reports
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], Self::row_to_report)?;
        rows.collect()
    }

    /// (reports stored, reports with every mandatory field present)
    pub fn get_counts(&self) -> SqliteResult<(usize, usize)> {
        let total: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;

        let complete: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE fields_present = fields_total",
            [],
            |row| row.get(0),
        )?;

        Ok((total, complete))
    }
}
