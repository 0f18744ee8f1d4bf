use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "catalex",
    version,
    about = "Catalog product extraction and reconciliation tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Extract(ExtractArgs),
    Export(ExportArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = ".cache/catalex")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = ".cache/catalex")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub dump_path: PathBuf,

    #[arg(long)]
    pub session_dir: Option<PathBuf>,

    #[arg(long)]
    pub run_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub max_pages: Option<usize>,

    #[arg(long, default_value_t = 0.85)]
    pub accept_threshold: f64,

    #[arg(long, default_value_t = 10)]
    pub sample_rows: usize,

    #[arg(long = "identifier-priority", value_enum)]
    pub identifier_priority: Vec<IdentifierPriority>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum IdentifierPriority {
    Upc,
    Sku,
    ItemNo,
}

impl IdentifierPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upc => "upc",
            Self::Sku => "sku",
            Self::ItemNo => "item-no",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(long, default_value = ".cache/catalex")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub session_path: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/catalex")]
    pub cache_root: PathBuf,
}
