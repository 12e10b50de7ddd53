//! Blocking HTTP transport shared by every cover provider.

use std::io::Read;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde_json::Value;

use crate::config::NetworkConfig;

const MAX_BODY_BYTES: u64 = 25 * 1024 * 1024;
const RATE_LIMIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited by provider (HTTP {0})")]
    RateLimited(u16),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("invalid JSON response: {0}")]
    Json(String),
}

impl FetchError {
    /// The provider answered that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status(404) | Self::Status(410))
    }
}

/// Minimal GET surface the providers need.
pub trait HttpFetch: Send + Sync {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let body = self.get_bytes(url)?;
        serde_json::from_slice(&body).map_err(|error| FetchError::Json(error.to_string()))
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// `ureq`-backed fetcher with a bounded timeout and request spacing.
pub struct UreqFetcher {
    http_client: ureq::Agent,
    user_agent: String,
    limiter: Option<DirectLimiter>,
}

impl UreqFetcher {
    pub fn new(network: &NetworkConfig) -> Self {
        let timeout = Duration::from_secs(network.request_timeout_secs);
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        let limiter = Quota::with_period(Duration::from_millis(network.min_request_interval_ms))
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));

        Self {
            http_client,
            user_agent: network.user_agent.clone(),
            limiter,
        }
    }

    fn wait_for_rate_limit_slot(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        while limiter.check().is_err() {
            std::thread::sleep(RATE_LIMIT_POLL_INTERVAL);
        }
    }

    fn classify_ureq_failure(error: ureq::Error) -> FetchError {
        match error {
            ureq::Error::Status(429, _) => FetchError::RateLimited(429),
            ureq::Error::Status(code, _) => FetchError::Status(code),
            ureq::Error::Transport(transport) => {
                let message = transport.to_string();
                let lowered = message.to_ascii_lowercase();
                if lowered.contains("timed out") || lowered.contains("timeout") {
                    FetchError::Timeout(message)
                } else {
                    FetchError::Transport(message)
                }
            }
        }
    }

    fn classify_io_failure(error: &std::io::Error) -> FetchError {
        let timed_out = matches!(
            error.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) || error.to_string().to_ascii_lowercase().contains("timed out");
        if timed_out {
            FetchError::Timeout(error.to_string())
        } else {
            FetchError::Body(error.to_string())
        }
    }
}

impl HttpFetch for UreqFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.wait_for_rate_limit_slot();
        let response = self
            .http_client
            .get(url)
            .set("User-Agent", &self.user_agent)
            .call()
            .map_err(Self::classify_ureq_failure)?;
        if response.status() != 200 {
            return Err(FetchError::Status(response.status()));
        }

        read_capped_body(response.into_reader(), MAX_BODY_BYTES)
    }
}

/// Reads a response body, failing rather than truncating past `limit` bytes.
fn read_capped_body(reader: impl Read, limit: u64) -> Result<Vec<u8>, FetchError> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|error| UreqFetcher::classify_io_failure(&error))?;
    if bytes.len() as u64 > limit {
        return Err(FetchError::Body(format!(
            "response body exceeds {limit} bytes"
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::{FetchError, HttpFetch};

    /// Canned responses keyed by exact URL; unknown URLs answer 404.
    #[derive(Default)]
    pub struct FakeFetcher {
        responses: HashMap<String, Result<Vec<u8>, FetchError>>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn with_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
            self.responses.insert(url.to_string(), Ok(bytes));
            self
        }

        pub fn with_json(self, url: &str, json: serde_json::Value) -> Self {
            self.with_bytes(url, json.to_string().into_bytes())
        }

        pub fn with_error(mut self, url: &str, error: FetchError) -> Self {
            self.responses.insert(url.to_string(), Err(error));
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested
                .lock()
                .expect("request log lock poisoned")
                .clone()
        }
    }

    impl HttpFetch for FakeFetcher {
        fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requested
                .lock()
                .expect("request log lock poisoned")
                .push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        }
    }
}
