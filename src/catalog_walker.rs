//! Drives a whole catalog through the resolver and tallies the results.

use std::path::Path;

use log::{debug, info};

use crate::catalog::{cover_filename, cover_reference, Catalog};
use crate::error::CoverError;
use crate::providers::ProviderKind;
use crate::resolver::{CoverResolver, ResolutionOutcome, ResolvedBy};

/// Per-run outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunStatistics {
    pub total: usize,
    pub already_resolved: usize,
    pub open_library: usize,
    pub google_books: usize,
    pub internet_archive: usize,
    pub isbn_fallback: usize,
    pub quality_rejected: usize,
    pub failed: usize,
}

impl RunStatistics {
    fn record_found(&mut self, resolved_by: ResolvedBy) {
        match resolved_by {
            ResolvedBy::Cached => self.already_resolved += 1,
            ResolvedBy::Provider(ProviderKind::OpenLibrary) => self.open_library += 1,
            ResolvedBy::Provider(ProviderKind::GoogleBooks) => self.google_books += 1,
            ResolvedBy::Provider(ProviderKind::InternetArchive) => self.internet_archive += 1,
            ResolvedBy::IsbnFallback => self.isbn_fallback += 1,
        }
    }

    pub fn resolved(&self) -> usize {
        self.already_resolved
            + self.open_library
            + self.google_books
            + self.internet_archive
            + self.isbn_fallback
    }

    /// Share of entries with a cover, as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.resolved() as f64 / self.total as f64 * 100.0
    }
}

/// An entry left without a cover, for operator follow-up.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UnresolvedEntry {
    pub partition: String,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunReport {
    pub statistics: RunStatistics,
    pub unresolved: Vec<UnresolvedEntry>,
}

pub struct CatalogWalker<'a> {
    resolver: &'a CoverResolver,
    cover_url_prefix: String,
}

impl<'a> CatalogWalker<'a> {
    pub fn new(resolver: &'a CoverResolver, cover_url_prefix: &str) -> Self {
        Self {
            resolver,
            cover_url_prefix: cover_url_prefix.to_string(),
        }
    }

    /// Resolves every entry once, updating `coverImage` in place.
    pub fn walk(&self, catalog: &mut Catalog) -> Result<RunReport, CoverError> {
        let mut report = RunReport::default();
        let total = catalog.entry_count();

        for (index, (partition, entry)) in catalog.entries_mut().enumerate() {
            report.statistics.total += 1;
            info!(
                "[{}/{}] {}: '{}' by {}",
                index + 1,
                total,
                partition,
                entry.title,
                entry.author
            );

            let resolution = self.resolver.resolve(entry)?;
            report.statistics.quality_rejected += resolution.quality_rejections.len();
            match resolution.outcome {
                ResolutionOutcome::Found { resolved_by, path } => {
                    debug!("Cover file: {}", path.display());
                    report.statistics.record_found(resolved_by);
                    entry.cover_image = Some(cover_reference(
                        &self.cover_url_prefix,
                        &cover_filename(entry),
                    ));
                }
                ResolutionOutcome::NotFound => {
                    report.statistics.failed += 1;
                    entry.cover_image = Some(String::new());
                    report.unresolved.push(UnresolvedEntry {
                        partition: partition.to_string(),
                        title: entry.title.clone(),
                        author: entry.author.clone(),
                        isbn: entry.isbn().map(str::to_string),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Loads the catalog, walks it, and rewrites it in full at `output_path`.
    pub fn run(&self, catalog_path: &Path, output_path: &Path) -> Result<RunReport, CoverError> {
        let mut catalog = Catalog::load(catalog_path)?;
        info!(
            "Loaded {} entries from {}",
            catalog.entry_count(),
            catalog_path.display()
        );
        let report = self.walk(&mut catalog)?;
        catalog.save(output_path)?;
        info!("Saved catalog to {}", output_path.display());
        Ok(report)
    }
}
