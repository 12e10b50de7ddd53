//! Ordered multi-provider cover resolution for a single catalog entry.
//!
//! Providers are tried in rank order and the first candidate that clears the
//! quality gate wins. Entries with an ISBN get one more unvalidated attempt
//! against the direct ISBN cover URL before giving up. Candidate bytes are
//! staged in a `.part` file and only renamed to the final cover path once
//! accepted, so a failed or interrupted attempt never leaves a cover file
//! behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};

use crate::catalog::{cover_filename, CatalogEntry};
use crate::error::CoverError;
use crate::providers::{CoverPayload, CoverProvider, DirectCoverSource, LookupOutcome, ProviderKind};
use crate::quality::{self, QualityThresholds};

/// What produced an accepted cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBy {
    /// The cover file already existed; no provider was asked.
    Cached,
    Provider(ProviderKind),
    /// The unvalidated direct ISBN tier.
    IsbnFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Found { resolved_by: ResolvedBy, path: PathBuf },
    NotFound,
}

/// Outcome for one entry plus the providers whose candidates were rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub quality_rejections: Vec<ProviderKind>,
}

impl Resolution {
    fn found(resolved_by: ResolvedBy, path: PathBuf, quality_rejections: Vec<ProviderKind>) -> Self {
        Self {
            outcome: ResolutionOutcome::Found { resolved_by, path },
            quality_rejections,
        }
    }
}

/// Tunables for a resolver that do not come from providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    pub thresholds: QualityThresholds,
    /// Floor for the unvalidated tier; anything at or below is treated as an error stub.
    pub fallback_min_bytes: u64,
    /// Sleep after every outbound provider attempt.
    pub request_pause: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            thresholds: QualityThresholds::default(),
            fallback_min_bytes: 1_000,
            request_pause: Duration::from_millis(750),
        }
    }
}

pub struct CoverResolver {
    providers: Vec<Box<dyn CoverProvider>>,
    fallback: Option<Box<dyn DirectCoverSource>>,
    covers_dir: PathBuf,
    settings: ResolverSettings,
}

impl CoverResolver {
    /// `providers` must already be in rank order.
    pub fn new(
        providers: Vec<Box<dyn CoverProvider>>,
        fallback: Option<Box<dyn DirectCoverSource>>,
        covers_dir: PathBuf,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            providers,
            fallback,
            covers_dir,
            settings,
        }
    }

    pub fn covers_dir(&self) -> &Path {
        &self.covers_dir
    }

    pub fn target_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.covers_dir.join(cover_filename(entry))
    }

    fn pause(&self) {
        if !self.settings.request_pause.is_zero() {
            std::thread::sleep(self.settings.request_pause);
        }
    }

    fn staging_path(target: &Path) -> PathBuf {
        let mut staged = target.as_os_str().to_owned();
        staged.push(".part");
        PathBuf::from(staged)
    }

    fn ensure_covers_dir(&self) -> Result<(), CoverError> {
        fs::create_dir_all(&self.covers_dir)
            .map_err(|source| CoverError::write(&self.covers_dir, source))
    }

    fn stage(payload: &CoverPayload, staged: &Path) -> Result<(), CoverError> {
        fs::write(staged, &payload.bytes).map_err(|source| CoverError::write(staged, source))
    }

    fn commit(staged: &Path, target: &Path) -> Result<(), CoverError> {
        fs::rename(staged, target).map_err(|source| CoverError::write(target, source))
    }

    fn discard(staged: &Path) -> Result<(), CoverError> {
        match fs::remove_file(staged) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CoverError::write(staged, source)),
        }
    }

    /// Writes the candidate, gates it, and either commits or deletes it.
    fn accept_validated(&self, payload: &CoverPayload, target: &Path) -> Result<bool, CoverError> {
        let staged = Self::staging_path(target);
        Self::stage(payload, &staged)?;
        if quality::validate_file(&staged, self.settings.thresholds) {
            Self::commit(&staged, target)?;
            return Ok(true);
        }
        Self::discard(&staged)?;
        Ok(false)
    }

    fn accept_unvalidated(&self, payload: &CoverPayload, target: &Path) -> Result<bool, CoverError> {
        if (payload.bytes.len() as u64) <= self.settings.fallback_min_bytes {
            debug!(
                "ISBN fallback: {} bytes from {} is below the stub floor",
                payload.bytes.len(),
                payload.source_url
            );
            return Ok(false);
        }
        let staged = Self::staging_path(target);
        Self::stage(payload, &staged)?;
        Self::commit(&staged, target)?;
        Ok(true)
    }

    /// Resolves one entry. Only filesystem write failures are returned as errors.
    pub fn resolve(&self, entry: &CatalogEntry) -> Result<Resolution, CoverError> {
        let target = self.target_path(entry);
        if target.exists() {
            return Ok(Resolution::found(ResolvedBy::Cached, target, Vec::new()));
        }

        self.ensure_covers_dir()?;
        let isbn = entry.normalized_isbn();
        let mut quality_rejections = Vec::new();

        for provider in &self.providers {
            let kind = provider.kind();
            if provider.requires_isbn() && isbn.is_none() {
                continue;
            }

            debug!("Trying {} for '{}'", kind, entry.title);
            let outcome = provider.lookup(entry);
            self.pause();
            match outcome {
                LookupOutcome::Found(payload) => {
                    if self.accept_validated(&payload, &target)? {
                        info!("'{}': cover from {}", entry.title, kind);
                        return Ok(Resolution::found(
                            ResolvedBy::Provider(kind),
                            target,
                            quality_rejections,
                        ));
                    }
                    info!(
                        "'{}': {} cover rejected by quality gate ({})",
                        entry.title, kind, payload.source_url
                    );
                    quality_rejections.push(kind);
                }
                LookupOutcome::NotFound => debug!("'{}': {} has no cover", entry.title, kind),
                LookupOutcome::Unavailable(reason) => {
                    debug!("'{}': {} unavailable: {}", entry.title, kind, reason)
                }
                LookupOutcome::Rejected(source_url) => {
                    info!(
                        "'{}': {} cover rejected by quality gate ({})",
                        entry.title, kind, source_url
                    );
                    quality_rejections.push(kind);
                }
            }
        }

        if let (Some(isbn), Some(fallback)) = (isbn.as_deref(), self.fallback.as_deref()) {
            debug!("Trying direct ISBN cover for '{}'", entry.title);
            let outcome = fallback.fetch_direct(isbn);
            self.pause();
            if let LookupOutcome::Found(payload) = outcome {
                if self.accept_unvalidated(&payload, &target)? {
                    info!("'{}': cover from unvalidated ISBN fallback", entry.title);
                    return Ok(Resolution::found(
                        ResolvedBy::IsbnFallback,
                        target,
                        quality_rejections,
                    ));
                }
            }
        }

        info!("'{}': no cover found", entry.title);
        Ok(Resolution {
            outcome: ResolutionOutcome::NotFound,
            quality_rejections,
        })
    }
}
