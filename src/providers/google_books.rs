//! Google Books adapter: title/author volume search.

use std::sync::Arc;

use serde_json::Value;

use crate::catalog::CatalogEntry;
use crate::config::NetworkConfig;
use crate::http_client::HttpFetch;
use crate::providers::{encode_query, CoverPayload, CoverProvider, LookupOutcome, ProviderKind};

/// `imageLinks` keys from best to worst quality.
const IMAGE_LINK_RANKING: [&str; 5] = ["extraLarge", "large", "medium", "small", "thumbnail"];
/// Query parameters that degrade the served image: `edge=curl` adds a page
/// curl and `zoom` pins a reduced scale.
const STRIPPED_QUERY_PARAMS: [&str; 2] = ["edge", "zoom"];

pub struct GoogleBooksProvider {
    fetcher: Arc<dyn HttpFetch>,
    api_url: String,
}

impl GoogleBooksProvider {
    pub fn new(fetcher: Arc<dyn HttpFetch>, network: &NetworkConfig) -> Self {
        Self {
            fetcher,
            api_url: network.google_books_api_url.clone(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/volumes?{}",
            self.api_url,
            encode_query(&[("q", query), ("maxResults", "1")])
        )
    }

    fn best_image_link(search: &Value) -> Option<&str> {
        let image_links = search
            .get("items")?
            .as_array()?
            .first()?
            .get("volumeInfo")?
            .get("imageLinks")?;
        IMAGE_LINK_RANKING
            .iter()
            .filter_map(|key| image_links.get(*key).and_then(Value::as_str))
            .find(|url| !url.trim().is_empty())
    }

    /// Forces https and drops quality-degrading query parameters.
    pub(crate) fn normalize_cover_url(url: &str) -> String {
        let trimmed = url.trim();
        let secure = match trimmed.strip_prefix("http://") {
            Some(rest) => format!("https://{rest}"),
            None => trimmed.to_string(),
        };
        let Some((base, query)) = secure.split_once('?') else {
            return secure;
        };
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or("");
                !pair.is_empty() && !STRIPPED_QUERY_PARAMS.contains(&key)
            })
            .collect();
        if kept.is_empty() {
            base.to_string()
        } else {
            format!("{base}?{}", kept.join("&"))
        }
    }
}

impl CoverProvider for GoogleBooksProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleBooks
    }

    fn lookup(&self, entry: &CatalogEntry) -> LookupOutcome {
        let query = entry.search_query();
        if query.is_empty() {
            return LookupOutcome::NotFound;
        }

        let search = match self.fetcher.get_json(&self.search_url(&query)) {
            Ok(search) => search,
            Err(error) => return LookupOutcome::from_fetch_error("volume search", &error),
        };
        let Some(image_url) = Self::best_image_link(&search) else {
            return LookupOutcome::NotFound;
        };

        let cover_url = Self::normalize_cover_url(image_url);
        match self.fetcher.get_bytes(&cover_url) {
            Ok(bytes) if bytes.is_empty() => LookupOutcome::NotFound,
            Ok(bytes) => LookupOutcome::Found(CoverPayload {
                bytes,
                source_url: cover_url,
            }),
            Err(error) => LookupOutcome::from_fetch_error("cover download", &error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::fake::FakeFetcher;
    use crate::http_client::FetchError;
    use serde_json::json;

    const SEARCH_URL: &str =
        "https://books.test/v1/volumes?q=Dune%20Frank%20Herbert&maxResults=1";

    fn build_provider(fetcher: FakeFetcher) -> (GoogleBooksProvider, Arc<FakeFetcher>) {
        let fetcher = Arc::new(fetcher);
        let network = NetworkConfig {
            google_books_api_url: "https://books.test/v1".to_string(),
            ..NetworkConfig::default()
        };
        (GoogleBooksProvider::new(fetcher.clone(), &network), fetcher)
    }

    fn dune() -> CatalogEntry {
        CatalogEntry::new("Dune", "Frank Herbert", Some("9780441013593"))
    }

    #[test]
    fn test_normalize_cover_url_forces_https_and_strips_curl_and_zoom() {
        assert_eq!(
            GoogleBooksProvider::normalize_cover_url(
                "http://books.google.com/books/content?id=abc&printsec=frontcover&img=1&zoom=1&edge=curl&source=gbs_api"
            ),
            "https://books.google.com/books/content?id=abc&printsec=frontcover&img=1&source=gbs_api"
        );
        let url = GoogleBooksProvider::normalize_cover_url(
            "http://books.google.com/books/content?id=abc&zoom=1&edge=curl",
        );
        assert_eq!(url, "https://books.google.com/books/content?id=abc");
        assert!(!url.contains("zoom"));
        assert_eq!(
            GoogleBooksProvider::normalize_cover_url("https://img.test/c.jpg?edge=curl"),
            "https://img.test/c.jpg"
        );
        assert_eq!(
            GoogleBooksProvider::normalize_cover_url("https://img.test/c.jpg"),
            "https://img.test/c.jpg"
        );
    }

    #[test]
    fn test_best_image_link_prefers_largest_variant() {
        let search = json!({"items": [{"volumeInfo": {"imageLinks": {
            "thumbnail": "http://img.test/t",
            "medium": "http://img.test/m",
            "small": "http://img.test/s"
        }}}]});
        assert_eq!(
            GoogleBooksProvider::best_image_link(&search),
            Some("http://img.test/m")
        );
        assert_eq!(
            GoogleBooksProvider::best_image_link(&json!({"totalItems": 0})),
            None
        );
    }

    #[test]
    fn test_lookup_downloads_normalized_best_image() {
        let (provider, fetcher) = build_provider(
            FakeFetcher::default()
                .with_json(
                    SEARCH_URL,
                    json!({"items": [{"volumeInfo": {"imageLinks": {
                        "thumbnail": "http://img.test/t?id=1&zoom=5&edge=curl",
                        "large": "http://img.test/l?id=1&zoom=1&edge=curl"
                    }}}]}),
                )
                .with_bytes("https://img.test/l?id=1", vec![7u8; 64]),
        );

        assert_eq!(
            provider.lookup(&dune()),
            LookupOutcome::Found(CoverPayload {
                bytes: vec![7u8; 64],
                source_url: "https://img.test/l?id=1".to_string(),
            })
        );
        assert_eq!(
            fetcher.requested(),
            vec![SEARCH_URL.to_string(), "https://img.test/l?id=1".to_string()]
        );
    }

    #[test]
    fn test_lookup_without_results_is_not_found() {
        let (provider, _) = build_provider(
            FakeFetcher::default().with_json(SEARCH_URL, json!({"kind": "books#volumes", "totalItems": 0})),
        );
        assert_eq!(provider.lookup(&dune()), LookupOutcome::NotFound);
    }

    #[test]
    fn test_lookup_collapses_transport_and_parse_failures() {
        let (provider, _) = build_provider(FakeFetcher::default().with_error(
            SEARCH_URL,
            FetchError::Timeout("timed out reading response".to_string()),
        ));
        assert!(matches!(
            provider.lookup(&dune()),
            LookupOutcome::Unavailable(_)
        ));

        let (provider, _) = build_provider(
            FakeFetcher::default().with_bytes(SEARCH_URL, b"<html>quota</html>".to_vec()),
        );
        assert!(matches!(
            provider.lookup(&dune()),
            LookupOutcome::Unavailable(_)
        ));
    }

    #[test]
    fn test_lookup_is_attempted_without_isbn() {
        let (provider, fetcher) = build_provider(FakeFetcher::default());
        let entry = CatalogEntry::new("Unknown Pamphlet", "J. Doe", None);
        assert!(!provider.requires_isbn());
        assert_eq!(provider.lookup(&entry), LookupOutcome::NotFound);
        assert_eq!(
            fetcher.requested(),
            vec!["https://books.test/v1/volumes?q=Unknown%20Pamphlet%20J.%20Doe&maxResults=1"]
        );
    }
}
