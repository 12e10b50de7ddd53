//! Open Library adapter: ISBN-keyed edition and work cover lookup.

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::catalog::CatalogEntry;
use crate::config::NetworkConfig;
use crate::http_client::HttpFetch;
use crate::providers::{CoverPayload, CoverProvider, DirectCoverSource, LookupOutcome, ProviderKind};
use crate::quality::{self, QualityThresholds};

/// Open Library adapter backed by a shared fetcher.
pub struct OpenLibraryProvider {
    fetcher: Arc<dyn HttpFetch>,
    api_url: String,
    covers_url: String,
    thresholds: QualityThresholds,
}

impl OpenLibraryProvider {
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        network: &NetworkConfig,
        thresholds: QualityThresholds,
    ) -> Self {
        Self {
            fetcher,
            api_url: network.open_library_api_url.clone(),
            covers_url: network.open_library_covers_url.clone(),
            thresholds,
        }
    }

    fn edition_url(&self, isbn: &str) -> String {
        format!("{}/isbn/{}.json", self.api_url, urlencoding::encode(isbn))
    }

    fn work_url(&self, work_key: &str) -> String {
        format!("{}{}.json", self.api_url, work_key)
    }

    fn cover_id_url(&self, cover_id: i64) -> String {
        format!("{}/b/id/{}-L.jpg", self.covers_url, cover_id)
    }

    fn direct_isbn_url(&self, isbn: &str) -> String {
        format!(
            "{}/b/isbn/{}-L.jpg?default=false",
            self.covers_url,
            urlencoding::encode(isbn)
        )
    }

    /// First usable cover id; Open Library marks removed covers with `-1`.
    fn first_cover_id(record: &Value) -> Option<i64> {
        record
            .get("covers")?
            .as_array()?
            .iter()
            .filter_map(Value::as_i64)
            .find(|cover_id| *cover_id > 0)
    }

    fn first_work_key(edition: &Value) -> Option<String> {
        let key = edition
            .get("works")?
            .as_array()?
            .first()?
            .get("key")?
            .as_str()?;
        key.starts_with("/works/").then(|| key.to_string())
    }

    /// Fetches the large image for a cover id and checks it against the gate.
    fn fetch_cover_candidate(&self, cover_id: i64, label: &str) -> CoverCandidate {
        let url = self.cover_id_url(cover_id);
        match self.fetcher.get_bytes(&url) {
            Ok(bytes) if quality::validate_bytes(&bytes, self.thresholds) => {
                CoverCandidate::Accepted(CoverPayload {
                    bytes,
                    source_url: url,
                })
            }
            Ok(_) => {
                debug!("Open Library: {label} cover {cover_id} failed the quality gate");
                CoverCandidate::Rejected(url)
            }
            Err(error) => {
                debug!("Open Library: {label} cover {cover_id} fetch failed: {error}");
                CoverCandidate::Missing
            }
        }
    }

    fn lookup_isbn(&self, isbn: &str) -> LookupOutcome {
        let edition = match self.fetcher.get_json(&self.edition_url(isbn)) {
            Ok(edition) => edition,
            Err(error) => return LookupOutcome::from_fetch_error("edition lookup", &error),
        };

        let mut rejected_url = None;
        if let Some(cover_id) = Self::first_cover_id(&edition) {
            match self.fetch_cover_candidate(cover_id, "edition") {
                CoverCandidate::Accepted(payload) => return LookupOutcome::Found(payload),
                CoverCandidate::Rejected(url) => rejected_url = Some(url),
                CoverCandidate::Missing => {}
            }
        }

        let work = match Self::first_work_key(&edition) {
            Some(work_key) => match self.fetcher.get_json(&self.work_url(&work_key)) {
                Ok(work) => Some(work),
                Err(error) if rejected_url.is_none() => {
                    return LookupOutcome::from_fetch_error("work lookup", &error)
                }
                Err(error) => {
                    debug!("Open Library: work lookup failed: {error}");
                    None
                }
            },
            None => None,
        };
        if let Some(cover_id) = work.as_ref().and_then(Self::first_cover_id) {
            match self.fetch_cover_candidate(cover_id, "work") {
                CoverCandidate::Accepted(payload) => return LookupOutcome::Found(payload),
                CoverCandidate::Rejected(url) => rejected_url = Some(url),
                CoverCandidate::Missing => {}
            }
        }

        rejected_url.map_or(LookupOutcome::NotFound, LookupOutcome::Rejected)
    }
}

/// One cover-id image after the quality gate.
enum CoverCandidate {
    Accepted(CoverPayload),
    Rejected(String),
    Missing,
}

impl CoverProvider for OpenLibraryProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenLibrary
    }

    fn requires_isbn(&self) -> bool {
        true
    }

    fn lookup(&self, entry: &CatalogEntry) -> LookupOutcome {
        match entry.normalized_isbn() {
            Some(isbn) => self.lookup_isbn(&isbn),
            None => LookupOutcome::NotFound,
        }
    }
}

impl DirectCoverSource for OpenLibraryProvider {
    fn fetch_direct(&self, normalized_isbn: &str) -> LookupOutcome {
        let url = self.direct_isbn_url(normalized_isbn);
        match self.fetcher.get_bytes(&url) {
            Ok(bytes) if bytes.is_empty() => LookupOutcome::NotFound,
            Ok(bytes) => LookupOutcome::Found(CoverPayload {
                bytes,
                source_url: url,
            }),
            Err(error) => LookupOutcome::from_fetch_error("direct isbn cover", &error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::fake::FakeFetcher;
    use crate::http_client::FetchError;
    use crate::quality::fixtures::noisy_png;
    use serde_json::json;

    const ISBN: &str = "9780441013593";
    const EDITION_URL: &str = "https://openlibrary.test/isbn/9780441013593.json";
    const WORK_URL: &str = "https://openlibrary.test/works/OL893415W.json";

    fn network() -> NetworkConfig {
        NetworkConfig {
            open_library_api_url: "https://openlibrary.test".to_string(),
            open_library_covers_url: "https://covers.openlibrary.test".to_string(),
            ..NetworkConfig::default()
        }
    }

    fn build_provider(fetcher: FakeFetcher) -> (OpenLibraryProvider, Arc<FakeFetcher>) {
        let fetcher = Arc::new(fetcher);
        let provider =
            OpenLibraryProvider::new(fetcher.clone(), &network(), QualityThresholds::default());
        (provider, fetcher)
    }

    fn dune() -> CatalogEntry {
        CatalogEntry::new("Dune", "Frank Herbert", Some("978-0-441-01359-3"))
    }

    #[test]
    fn test_lookup_uses_edition_cover_id() {
        let cover = noisy_png(400, 600);
        let (provider, fetcher) = build_provider(
            FakeFetcher::default()
                .with_json(EDITION_URL, json!({"covers": [-1, 8231856]}))
                .with_bytes(
                    "https://covers.openlibrary.test/b/id/8231856-L.jpg",
                    cover.clone(),
                ),
        );

        match provider.lookup(&dune()) {
            LookupOutcome::Found(payload) => {
                assert_eq!(payload.bytes, cover);
                assert_eq!(
                    payload.source_url,
                    "https://covers.openlibrary.test/b/id/8231856-L.jpg"
                );
            }
            other => panic!("expected found, got {other:?}"),
        }
        assert_eq!(fetcher.requested().len(), 2);
    }

    #[test]
    fn test_lookup_falls_back_to_work_cover_when_edition_cover_is_stub() {
        let cover = noisy_png(350, 500);
        let (provider, fetcher) = build_provider(
            FakeFetcher::default()
                .with_json(
                    EDITION_URL,
                    json!({"covers": [111], "works": [{"key": "/works/OL893415W"}]}),
                )
                .with_bytes(
                    "https://covers.openlibrary.test/b/id/111-L.jpg",
                    noisy_png(20, 30),
                )
                .with_json(WORK_URL, json!({"covers": [222]}))
                .with_bytes("https://covers.openlibrary.test/b/id/222-L.jpg", cover.clone()),
        );

        assert_eq!(
            provider.lookup(&dune()),
            LookupOutcome::Found(CoverPayload {
                bytes: cover,
                source_url: "https://covers.openlibrary.test/b/id/222-L.jpg".to_string(),
            })
        );
        assert!(fetcher.requested().contains(&WORK_URL.to_string()));
    }

    #[test]
    fn test_lookup_reports_rejection_when_every_candidate_fails_the_gate() {
        let (provider, _) = build_provider(
            FakeFetcher::default()
                .with_json(
                    EDITION_URL,
                    json!({"covers": [111], "works": [{"key": "/works/OL893415W"}]}),
                )
                .with_bytes(
                    "https://covers.openlibrary.test/b/id/111-L.jpg",
                    noisy_png(20, 30),
                )
                .with_json(WORK_URL, json!({"covers": [222]}))
                .with_bytes(
                    "https://covers.openlibrary.test/b/id/222-L.jpg",
                    noisy_png(100, 150),
                ),
        );
        assert_eq!(
            provider.lookup(&dune()),
            LookupOutcome::Rejected("https://covers.openlibrary.test/b/id/222-L.jpg".to_string())
        );

        let (provider, _) = build_provider(
            FakeFetcher::default()
                .with_json(
                    EDITION_URL,
                    json!({"covers": [111], "works": [{"key": "/works/OL893415W"}]}),
                )
                .with_bytes(
                    "https://covers.openlibrary.test/b/id/111-L.jpg",
                    noisy_png(20, 30),
                )
                .with_error(WORK_URL, FetchError::Status(503)),
        );
        assert_eq!(
            provider.lookup(&dune()),
            LookupOutcome::Rejected("https://covers.openlibrary.test/b/id/111-L.jpg".to_string())
        );
    }

    #[test]
    fn test_lookup_without_covers_or_works_is_not_found() {
        let (provider, _) = build_provider(
            FakeFetcher::default().with_json(EDITION_URL, json!({"title": "Dune"})),
        );
        assert_eq!(provider.lookup(&dune()), LookupOutcome::NotFound);
    }

    #[test]
    fn test_lookup_unknown_isbn_is_not_found_and_server_error_is_unavailable() {
        let (provider, _) = build_provider(FakeFetcher::default());
        assert_eq!(provider.lookup(&dune()), LookupOutcome::NotFound);

        let (provider, _) = build_provider(
            FakeFetcher::default().with_error(EDITION_URL, FetchError::Status(503)),
        );
        assert!(matches!(
            provider.lookup(&dune()),
            LookupOutcome::Unavailable(_)
        ));
    }

    #[test]
    fn test_lookup_without_isbn_makes_no_requests() {
        let (provider, fetcher) = build_provider(FakeFetcher::default());
        let entry = CatalogEntry::new("Unknown Pamphlet", "J. Doe", None);
        assert!(provider.requires_isbn());
        assert_eq!(provider.lookup(&entry), LookupOutcome::NotFound);
        assert!(fetcher.requested().is_empty());
    }

    #[test]
    fn test_fetch_direct_accepts_any_non_empty_bytes() {
        let direct_url = "https://covers.openlibrary.test/b/isbn/9780441013593-L.jpg?default=false";
        let (provider, _) =
            build_provider(FakeFetcher::default().with_bytes(direct_url, vec![0xff; 4_000]));
        assert!(matches!(
            provider.fetch_direct(ISBN),
            LookupOutcome::Found(payload) if payload.bytes.len() == 4_000
        ));

        let (provider, _) = build_provider(FakeFetcher::default().with_bytes(direct_url, Vec::new()));
        assert_eq!(provider.fetch_direct(ISBN), LookupOutcome::NotFound);
    }

    #[test]
    fn test_first_work_key_rejects_non_work_paths() {
        assert_eq!(
            OpenLibraryProvider::first_work_key(&json!({"works": [{"key": "/authors/OL1A"}]})),
            None
        );
        assert_eq!(
            OpenLibraryProvider::first_work_key(&json!({"works": [{"key": "/works/OL1W"}]}))
                .as_deref(),
            Some("/works/OL1W")
        );
    }
}
