//! Cover provider abstractions and concrete adapters.

pub mod google_books;
pub mod internet_archive;
pub mod open_library;

use std::fmt;

use crate::catalog::CatalogEntry;
use crate::http_client::FetchError;

/// Identity of a provider, in resolution rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    OpenLibrary,
    GoogleBooks,
    InternetArchive,
}

impl ProviderKind {
    pub fn source_name(self) -> &'static str {
        match self {
            Self::OpenLibrary => "Open Library",
            Self::GoogleBooks => "Google Books",
            Self::InternetArchive => "Internet Archive",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_name())
    }
}

/// Candidate cover bytes and where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverPayload {
    pub bytes: Vec<u8>,
    pub source_url: String,
}

/// Result of one provider lookup. Never an error across the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(CoverPayload),
    /// The provider answered and has no usable cover.
    NotFound,
    /// The provider could not be asked or gave an unusable answer.
    Unavailable(String),
    /// The provider had candidates, and every one failed its own quality gate.
    Rejected(String),
}

impl LookupOutcome {
    /// Maps a failed request: 404 means not found, anything else unavailable.
    pub fn from_fetch_error(context: &str, error: &FetchError) -> Self {
        if error.is_not_found() {
            Self::NotFound
        } else {
            Self::Unavailable(format!("{context}: {error}"))
        }
    }
}

/// Interface implemented by every cover source.
pub trait CoverProvider {
    fn kind(&self) -> ProviderKind;

    /// Providers keyed purely by ISBN are skipped for entries without one.
    fn requires_isbn(&self) -> bool {
        false
    }

    fn lookup(&self, entry: &CatalogEntry) -> LookupOutcome;
}

/// Last-resort ISBN image source whose result bypasses the quality gate.
pub trait DirectCoverSource {
    fn fetch_direct(&self, normalized_isbn: &str) -> LookupOutcome;
}

/// Joins `key=value` pairs with each value percent-encoded.
pub(crate) fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_orders_by_rank() {
        let mut kinds = vec![
            ProviderKind::InternetArchive,
            ProviderKind::OpenLibrary,
            ProviderKind::GoogleBooks,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                ProviderKind::OpenLibrary,
                ProviderKind::GoogleBooks,
                ProviderKind::InternetArchive
            ]
        );
    }

    #[test]
    fn test_lookup_outcome_from_fetch_error() {
        assert_eq!(
            LookupOutcome::from_fetch_error("edition", &FetchError::Status(404)),
            LookupOutcome::NotFound
        );
        assert!(matches!(
            LookupOutcome::from_fetch_error("edition", &FetchError::Status(503)),
            LookupOutcome::Unavailable(reason) if reason.starts_with("edition:")
        ));
    }

    #[test]
    fn test_encode_query_percent_encodes_values() {
        assert_eq!(
            encode_query(&[("q", "Dune Frank Herbert"), ("maxResults", "1")]),
            "q=Dune%20Frank%20Herbert&maxResults=1"
        );
    }
}
