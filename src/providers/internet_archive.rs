//! Internet Archive adapter: best-effort archival scan lookup.

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::catalog::CatalogEntry;
use crate::config::NetworkConfig;
use crate::http_client::HttpFetch;
use crate::providers::{encode_query, CoverPayload, CoverProvider, LookupOutcome, ProviderKind};

pub struct InternetArchiveProvider {
    fetcher: Arc<dyn HttpFetch>,
    base_url: String,
}

impl InternetArchiveProvider {
    pub fn new(fetcher: Arc<dyn HttpFetch>, network: &NetworkConfig) -> Self {
        Self {
            fetcher,
            base_url: network.internet_archive_url.clone(),
        }
    }

    fn item_image_url(&self, identifier: &str) -> String {
        format!(
            "{}/services/img/{}",
            self.base_url,
            urlencoding::encode(identifier)
        )
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/advancedsearch.php?{}",
            self.base_url,
            encode_query(&[
                ("q", query),
                ("fl[]", "identifier"),
                ("rows", "1"),
                ("output", "json"),
            ])
        )
    }

    fn first_identifier(search: &Value) -> Option<&str> {
        search
            .get("response")?
            .get("docs")?
            .as_array()?
            .first()?
            .get("identifier")?
            .as_str()
            .filter(|identifier| !identifier.trim().is_empty())
    }

    fn fetch_item_image(&self, identifier: &str) -> LookupOutcome {
        let url = self.item_image_url(identifier);
        match self.fetcher.get_bytes(&url) {
            Ok(bytes) if bytes.is_empty() => LookupOutcome::NotFound,
            Ok(bytes) => LookupOutcome::Found(CoverPayload {
                bytes,
                source_url: url,
            }),
            Err(error) => LookupOutcome::from_fetch_error("item image", &error),
        }
    }

    fn search_identifier(&self, query: &str) -> Result<Option<String>, LookupOutcome> {
        let search = self
            .fetcher
            .get_json(&self.search_url(query))
            .map_err(|error| LookupOutcome::from_fetch_error("advanced search", &error))?;
        Ok(Self::first_identifier(&search).map(str::to_string))
    }

    fn lookup_inner(&self, entry: &CatalogEntry) -> LookupOutcome {
        if let Some(isbn) = entry.normalized_isbn() {
            return self.fetch_item_image(&format!("isbn_{isbn}"));
        }

        let query = entry.search_query();
        if query.is_empty() {
            return LookupOutcome::NotFound;
        }
        match self.search_identifier(&query) {
            Ok(Some(identifier)) => self.fetch_item_image(&identifier),
            Ok(None) => LookupOutcome::NotFound,
            Err(outcome) => outcome,
        }
    }
}

impl CoverProvider for InternetArchiveProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::InternetArchive
    }

    fn lookup(&self, entry: &CatalogEntry) -> LookupOutcome {
        let outcome = self.lookup_inner(entry);
        if let LookupOutcome::Unavailable(reason) = &outcome {
            debug!("Internet Archive: best-effort lookup skipped: {reason}");
        }
        outcome
    }
}
