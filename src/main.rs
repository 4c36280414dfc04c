mod catalogue;
mod cli;
mod compliance;
mod config;
mod extraction;
mod pipeline;
mod report;
mod report_db;
mod structure;

use clap::Parser;
use cli::{Cli, Commands, HistoryArgs, ReconcileArgs};
use pipeline::{DocumentResult, Reconciler};
use report_db::ReportStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::Config::load_or_default(&cli.config)?;
    let (catalogue, matcher) = cfg.build_matching()?;
    let reconciler = Arc::new(Reconciler::new(catalogue, matcher));

    match cli.command {
        Commands::Reconcile(args) => reconcile(args, reconciler, &cfg.db_path).await,
        Commands::Catalogue => {
            for field in reconciler.catalogue().fields() {
                println!("{:>2}  {}", field.position + 1, field.name);
            }
            Ok(())
        }
        Commands::History(args) => history(args, &cfg.db_path),
    }
}

#[derive(Serialize)]
struct ReconcileResponse<'a> {
    results: &'a [DocumentResult],
}

async fn reconcile(
    args: ReconcileArgs,
    reconciler: Arc<Reconciler>,
    db_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let results = pipeline::reconcile_files(args.files, reconciler).await?;

    if args.store {
        let db = open_store(db_path)?;
        for result in &results {
            db.upsert_report(&result.filename, &result.structured_data)?;
        }
        let (reports_total, reports_complete) = db.get_counts()?;
        info!(reports_total, reports_complete, "Report database statistics");
    }

    let body = ReconcileResponse { results: &results };
    if args.compact {
        println!("{}", serde_json::to_string(&body)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}

fn history(args: HistoryArgs, db_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(db_path)?;

    if let Some(uid) = &args.uid {
        let stored = db
            .get_report(uid)?
            .ok_or_else(|| format!("No report stored with uid {uid}"))?;
        info!(uid = %stored.uid, filename = %stored.filename, created_at = %stored.created_at, "Loaded report");
        println!("{}", stored.report_json);
        return Ok(());
    }

    for stored in db.recent_reports(args.limit)? {
        println!(
            "{}  {:<40}  {:>2}/{:<2}  {:>6.2}%  {}",
            stored.created_at,
            stored.filename,
            stored.fields_present,
            stored.fields_total,
            stored.completion_percentage,
            &stored.uid[..12],
        );
    }

    let (reports_total, reports_complete) = db.get_counts()?;
    info!(reports_total, reports_complete, "Report database statistics");
    Ok(())
}

fn open_store(db_path: &str) -> Result<ReportStore, Box<dyn std::error::Error>> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(ReportStore::new(db_path)?)
}
