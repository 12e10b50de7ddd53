mod catalog;
mod catalog_walker;
mod cli;
mod config;
mod error;
mod http_client;
mod providers;
mod quality;
mod reconcile;
mod resolver;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;

use catalog::Catalog;
use catalog_walker::{CatalogWalker, RunReport};
use cli::{CatalogPaths, Cli, Commands};
use config::Config;
use error::CoverError;
use http_client::{HttpFetch, UreqFetcher};
use providers::google_books::GoogleBooksProvider;
use providers::internet_archive::InternetArchiveProvider;
use providers::open_library::OpenLibraryProvider;
use providers::{CoverProvider, DirectCoverSource};
use quality::QualityThresholds;
use reconcile::ReconcileReport;
use resolver::{CoverResolver, ResolverSettings};

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    clog.filter(None, level);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));
}

fn apply_path_overrides(config: &mut Config, paths: CatalogPaths) {
    if let Some(catalog) = paths.catalog {
        config.catalog.input_path = catalog;
    }
    if let Some(covers_dir) = paths.covers_dir {
        config.catalog.covers_dir = covers_dir;
    }
}

/// Wires the enabled providers, in rank order, onto one shared fetcher.
fn build_resolver(config: &Config) -> CoverResolver {
    let fetcher: Arc<dyn HttpFetch> = Arc::new(UreqFetcher::new(&config.network));
    let thresholds = QualityThresholds::from(&config.quality);

    let mut providers: Vec<Box<dyn CoverProvider>> = Vec::new();
    if config.providers.open_library {
        providers.push(Box::new(OpenLibraryProvider::new(
            fetcher.clone(),
            &config.network,
            thresholds,
        )));
    }
    if config.providers.google_books {
        providers.push(Box::new(GoogleBooksProvider::new(
            fetcher.clone(),
            &config.network,
        )));
    }
    if config.providers.internet_archive {
        providers.push(Box::new(InternetArchiveProvider::new(
            fetcher.clone(),
            &config.network,
        )));
    }

    let fallback: Option<Box<dyn DirectCoverSource>> = if config.providers.isbn_fallback {
        Some(Box::new(OpenLibraryProvider::new(
            fetcher,
            &config.network,
            thresholds,
        )))
    } else {
        None
    };

    CoverResolver::new(
        providers,
        fallback,
        config.catalog.covers_dir.clone(),
        ResolverSettings {
            thresholds,
            fallback_min_bytes: config.quality.fallback_min_bytes,
            request_pause: Duration::from_millis(config.network.request_pause_ms),
        },
    )
}

fn write_unresolved_report(report: &RunReport, path: &Path) -> Result<(), CoverError> {
    let mut text =
        serde_json::to_string_pretty(&report.unresolved).map_err(CoverError::CatalogSerialize)?;
    text.push('\n');
    std::fs::write(path, text).map_err(|source| CoverError::write(path, source))
}

fn print_run_summary(report: &RunReport, covers_dir: &Path, output_path: &Path) {
    let stats = &report.statistics;
    println!("{}", "=".repeat(60));
    println!("COVER SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Total books:               {}", stats.total);
    println!("Already downloaded:        {}", stats.already_resolved);
    println!("Open Library (ISBN):       {}", stats.open_library);
    println!("Google Books (search):     {}", stats.google_books);
    println!("Internet Archive:          {}", stats.internet_archive);
    println!("ISBN fallback (unchecked): {}", stats.isbn_fallback);
    println!("Rejected by quality gate:  {}", stats.quality_rejected);
    println!("No cover found:            {}", stats.failed);
    println!("Success rate:              {:.1}%", stats.success_rate());
    println!("Covers directory:          {}", covers_dir.display());
    println!("Updated catalog:           {}", output_path.display());

    if !report.unresolved.is_empty() {
        println!();
        println!("Books without covers:");
        for entry in &report.unresolved {
            println!("  - {} by {} ({})", entry.title, entry.author, entry.partition);
        }
    }
}

fn print_reconcile_summary(report: &ReconcileReport, catalog_path: &Path) {
    if report.changed() {
        for linked in &report.linked {
            println!("  + {} by {}: {}", linked.title, linked.author, linked.filename);
        }
        println!(
            "Linked {} manual cover(s). Saved to {}",
            report.linked.len(),
            catalog_path.display()
        );
    } else {
        println!("No updates needed. All covers are already linked.");
    }

    if !report.missing.is_empty() {
        println!();
        println!(
            "{} cover(s) referenced in the catalog are missing from disk:",
            report.missing.len()
        );
        for missing in &report.missing {
            println!("  - {} by {}: {}", missing.title, missing.author, missing.reference);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch {
            paths,
            output,
            in_place,
            unresolved_report,
        } => {
            apply_path_overrides(&mut config, paths);
            if in_place {
                config.catalog.in_place = true;
            } else if let Some(output) = output {
                config.catalog.output_path = output;
                config.catalog.in_place = false;
            }
            let output_path = config.catalog.effective_output_path();

            let resolver = build_resolver(&config);
            let walker = CatalogWalker::new(&resolver, &config.catalog.cover_url_prefix);
            let report = walker.run(&config.catalog.input_path, &output_path)?;

            if let Some(report_path) = unresolved_report {
                write_unresolved_report(&report, &report_path)?;
                info!("Wrote unresolved list to {}", report_path.display());
            }
            print_run_summary(&report, resolver.covers_dir(), &output_path);
        }
        Commands::Reconcile { paths } => {
            apply_path_overrides(&mut config, paths);
            let catalog_path = config.catalog.input_path.clone();
            let mut catalog = Catalog::load(&catalog_path)?;
            let report = reconcile::reconcile_manual_covers(
                &mut catalog,
                &config.catalog.covers_dir,
                &config.catalog.cover_url_prefix,
            );
            if report.changed() {
                catalog.save(&catalog_path)?;
            }
            print_reconcile_summary(&report, &catalog_path);
        }
    }

    Ok(())
}
