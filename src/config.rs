//! Run configuration model, defaults, and loading.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::CoverError;

const CONFIG_DIR_NAME: &str = "covershelf";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Root configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Catalog and covers-directory locations.
    pub catalog: CatalogConfig,
    #[serde(default)]
    /// Quality gate thresholds.
    pub quality: QualityConfig,
    #[serde(default)]
    /// Outbound request behavior.
    pub network: NetworkConfig,
    #[serde(default)]
    /// Per-provider enable flags.
    pub providers: ProvidersConfig,
}

/// Catalog file and covers directory locations.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,
    /// Where the updated catalog is written unless `in_place` is set.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Rewrite `input_path` instead of writing to `output_path`.
    #[serde(default)]
    pub in_place: bool,
    #[serde(default = "default_covers_dir")]
    pub covers_dir: PathBuf,
    /// Prefix stored in `coverImage`, joined with the cover filename.
    #[serde(default = "default_cover_url_prefix")]
    pub cover_url_prefix: String,
}

/// Thresholds applied by the quality gate.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct QualityConfig {
    /// Minimum width and height in pixels.
    #[serde(default = "default_min_dimension_px")]
    pub min_dimension_px: u32,
    #[serde(default = "default_min_size_bytes")]
    pub min_size_bytes: u64,
    /// Floor for the unvalidated ISBN fallback tier.
    #[serde(default = "default_fallback_min_bytes")]
    pub fallback_min_bytes: u64,
}

/// Outbound HTTP behavior shared by all providers.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause inserted after each provider attempt.
    #[serde(default = "default_request_pause_ms")]
    pub request_pause_ms: u64,
    /// Minimum spacing between raw HTTP requests.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_open_library_api_url")]
    pub open_library_api_url: String,
    #[serde(default = "default_open_library_covers_url")]
    pub open_library_covers_url: String,
    #[serde(default = "default_google_books_api_url")]
    pub google_books_api_url: String,
    #[serde(default = "default_internet_archive_url")]
    pub internet_archive_url: String,
}

/// Enable flags for each provider. Rank order is fixed regardless.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_true")]
    pub open_library: bool,
    #[serde(default = "default_true")]
    pub google_books: bool,
    #[serde(default = "default_true")]
    pub internet_archive: bool,
    /// Enables the unvalidated direct ISBN cover tier.
    #[serde(default = "default_true")]
    pub isbn_fallback: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_path: default_output_path(),
            in_place: false,
            covers_dir: default_covers_dir(),
            cover_url_prefix: default_cover_url_prefix(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_dimension_px: default_min_dimension_px(),
            min_size_bytes: default_min_size_bytes(),
            fallback_min_bytes: default_fallback_min_bytes(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            request_pause_ms: default_request_pause_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            user_agent: default_user_agent(),
            open_library_api_url: default_open_library_api_url(),
            open_library_covers_url: default_open_library_covers_url(),
            google_books_api_url: default_google_books_api_url(),
            internet_archive_url: default_internet_archive_url(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            open_library: true,
            google_books: true,
            internet_archive: true,
            isbn_fallback: true,
        }
    }
}

impl CatalogConfig {
    /// Path the updated catalog is persisted to.
    pub fn effective_output_path(&self) -> PathBuf {
        if self.in_place {
            self.input_path.clone()
        } else {
            self.output_path.clone()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_input_path() -> PathBuf {
    PathBuf::from("src/data/books.json")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("src/data/books_with_covers.json")
}

fn default_covers_dir() -> PathBuf {
    PathBuf::from("public/covers")
}

fn default_cover_url_prefix() -> String {
    "/covers".to_string()
}

fn default_min_dimension_px() -> u32 {
    300
}

fn default_min_size_bytes() -> u64 {
    20_000
}

fn default_fallback_min_bytes() -> u64 {
    1_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_request_pause_ms() -> u64 {
    750
}

fn default_min_request_interval_ms() -> u64 {
    250
}

fn default_user_agent() -> String {
    format!("covershelf/{}", env!("CARGO_PKG_VERSION"))
}

fn default_open_library_api_url() -> String {
    "https://openlibrary.org".to_string()
}

fn default_open_library_covers_url() -> String {
    "https://covers.openlibrary.org".to_string()
}

fn default_google_books_api_url() -> String {
    "https://www.googleapis.com/books/v1".to_string()
}

fn default_internet_archive_url() -> String {
    "https://archive.org".to_string()
}

/// Clamps values that would make a run misbehave.
pub fn sanitize_config(config: Config) -> Config {
    let trimmed_prefix = config.catalog.cover_url_prefix.trim_end_matches('/');
    Config {
        catalog: CatalogConfig {
            cover_url_prefix: trimmed_prefix.to_string(),
            ..config.catalog
        },
        quality: QualityConfig {
            min_dimension_px: config.quality.min_dimension_px.max(1),
            min_size_bytes: config.quality.min_size_bytes,
            fallback_min_bytes: config.quality.fallback_min_bytes.max(1),
        },
        network: NetworkConfig {
            request_timeout_secs: config.network.request_timeout_secs.clamp(1, 120),
            request_pause_ms: config.network.request_pause_ms.min(60_000),
            min_request_interval_ms: config.network.min_request_interval_ms.min(60_000),
            user_agent: if config.network.user_agent.trim().is_empty() {
                default_user_agent()
            } else {
                config.network.user_agent
            },
            open_library_api_url: trim_base_url(config.network.open_library_api_url),
            open_library_covers_url: trim_base_url(config.network.open_library_covers_url),
            google_books_api_url: trim_base_url(config.network.google_books_api_url),
            internet_archive_url: trim_base_url(config.network.internet_archive_url),
        },
        providers: config.providers,
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Default config location under the user's config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|path| path.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Parses a config file. A missing file is an error; callers decide the fallback.
pub fn load_config_file(path: &Path) -> Result<Config, CoverError> {
    let content = std::fs::read_to_string(path).map_err(|source| CoverError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str::<Config>(&content).map_err(|source| CoverError::Config {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(sanitize_config(config))
}

/// Resolves the effective config: explicit path, then the user config file, then defaults.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config, CoverError> {
    if let Some(path) = explicit_path {
        info!("Loading config. path={}", path.display());
        return load_config_file(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading config. path={}", path.display());
            load_config_file(&path)
        }
        Some(path) => {
            info!(
                "Config file not found. Using defaults. path={}",
                path.display()
            );
            Ok(Config::default())
        }
        None => {
            warn!("No user config directory available. Using defaults");
            Ok(Config::default())
        }
    }
}
