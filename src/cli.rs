use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "einvoice_check",
    version,
    about = "Reconcile extracted e-invoice fields against the mandatory-field catalogue"
)]
pub struct Cli {
    #[arg(long, global = true, default_value = ".config/einvoice_check.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a compliance report for each extraction file.
    Reconcile(ReconcileArgs),
    /// Print the active mandatory-field catalogue.
    Catalogue,
    /// List previously stored reports.
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    /// Extraction files (JSON array, `{"extractions": [...]}` or JSON Lines).
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Persist each report in the report database.
    #[arg(long, default_value_t = false)]
    pub store: bool,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Print the stored report JSON for this uid instead of the listing.
    #[arg(long)]
    pub uid: Option<String>,
}
