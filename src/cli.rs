use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "covershelf")]
#[command(author, version, about = "Resolve cover images for a book catalog")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch covers for every catalog entry and write the updated catalog
    Fetch {
        #[command(flatten)]
        paths: CatalogPaths,

        /// Where to write the updated catalog (defaults to the configured output path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rewrite the input catalog in place
        #[arg(long, conflicts_with = "output")]
        in_place: bool,

        /// Write entries that still lack a cover to this JSON file
        #[arg(long)]
        unresolved_report: Option<PathBuf>,
    },

    /// Link cover files added by hand to their catalog entries
    Reconcile {
        #[command(flatten)]
        paths: CatalogPaths,
    },
}

#[derive(Args)]
pub struct CatalogPaths {
    /// Catalog JSON file to read
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Directory holding cover images
    #[arg(long)]
    pub covers_dir: Option<PathBuf>,
}
