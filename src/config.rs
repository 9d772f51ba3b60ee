// =============================================================================
// config.rs — EVERY KNOB IN ONE PLACE
// =============================================================================
//
// All values can be overridden via RATE_ENGINE_* environment variables (a
// .env file is read first if present). Defaults match the behaviour the
// comparison site has been scraped with so far: a 60 second wait for
// rendered elements, three attempts per page, ten seconds between attempts.
//
// Numeric knobs that fail to parse fall back to their default with a warning.
// Enumerated knobs (storage backend, storage mode) are strict, because a
// typo there would silently write somewhere unexpected.
// =============================================================================

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{RateError, RateResult};

/// Which snapshot sink the binary writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redis,
    File,
}

impl FromStr for StorageBackend {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StorageBackend::Redis),
            "file" | "json" => Ok(StorageBackend::File),
            other => Err(RateError::Config(format!("unknown storage backend {other:?}"))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Redis => write!(f, "redis"),
            StorageBackend::File => write!(f, "file"),
        }
    }
}

/// Whether a write replaces the latest snapshot or adds to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Replace,
    Append,
}

impl FromStr for StorageMode {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(StorageMode::Replace),
            "append" => Ok(StorageMode::Append),
            other => Err(RateError::Config(format!("unknown storage mode {other:?}"))),
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Replace => write!(f, "replace"),
            StorageMode::Append => write!(f, "append"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // SOURCES
    // =========================================================================

    /// JSON registry of banks, loan URL templates and amount tiers.
    pub sources_path: PathBuf,

    /// Deposit pages live at `{deposit_base_url}/{short_name}`.
    pub deposit_base_url: String,

    /// Loan listing pages live at `{loan_listing_base_url}/{short_name}`.
    pub loan_listing_base_url: String,

    // =========================================================================
    // FETCHING AND RENDERING
    // =========================================================================

    pub user_agent: String,

    /// Per-request timeout for plain HTTP fetches.
    pub http_timeout: Duration,

    /// How long to wait for a rendered element before giving up.
    pub render_timeout: Duration,

    /// Explicit Chromium binary; when unset the usual locations are searched.
    pub chrome_executable: Option<PathBuf>,

    pub headless: bool,

    // =========================================================================
    // RETRIES
    // =========================================================================

    /// Total attempts per page, first try included.
    pub retry_attempts: u32,

    /// Fixed pause between attempts.
    pub retry_delay: Duration,

    // =========================================================================
    // STORAGE
    // =========================================================================

    pub storage_backend: StorageBackend,
    pub storage_mode: StorageMode,

    /// Redis connection URL for the redis backend.
    pub redis_url: String,

    /// Prefix for every Redis key the engine touches.
    pub redis_key_prefix: String,

    /// Directory for the file backend.
    pub snapshot_dir: PathBuf,

    // =========================================================================
    // LOGGING
    // =========================================================================

    /// Emit one JSON object per log line instead of the human format.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sources_path: PathBuf::from("sources.json"),
            deposit_base_url: "https://www.hangikredi.com/yatirim-araclari/mevduat-faiz-oranlari"
                .to_string(),
            loan_listing_base_url: "https://www.hangikredi.com/kredi/ihtiyac-kredisi".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) RateHarvestEngine/0.1".to_string(),
            http_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(60),
            chrome_executable: None,
            headless: true,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(10),
            storage_backend: StorageBackend::File,
            storage_mode: StorageMode::Replace,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            redis_key_prefix: "rates".to_string(),
            snapshot_dir: PathBuf::from("data/snapshots"),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from the environment on top of the defaults.
    pub fn from_env() -> RateResult<Self> {
        let _ = dotenvy::dotenv();
        let d = Config::default();

        let config = Config {
            sources_path: PathBuf::from(env_or_default(
                "RATE_ENGINE_SOURCES",
                &d.sources_path.to_string_lossy(),
            )),
            deposit_base_url: env_or_default("RATE_ENGINE_DEPOSIT_BASE_URL", &d.deposit_base_url),
            loan_listing_base_url: env_or_default(
                "RATE_ENGINE_LOAN_LISTING_BASE_URL",
                &d.loan_listing_base_url,
            ),
            user_agent: env_or_default("RATE_ENGINE_USER_AGENT", &d.user_agent),
            http_timeout: Duration::from_secs(env_parse(
                "RATE_ENGINE_HTTP_TIMEOUT_SECS",
                d.http_timeout.as_secs(),
            )),
            render_timeout: Duration::from_secs(env_parse(
                "RATE_ENGINE_RENDER_TIMEOUT_SECS",
                d.render_timeout.as_secs(),
            )),
            chrome_executable: env::var("RATE_ENGINE_CHROME").ok().map(PathBuf::from),
            headless: env_parse("RATE_ENGINE_HEADLESS", d.headless),
            retry_attempts: env_parse("RATE_ENGINE_RETRY_ATTEMPTS", d.retry_attempts),
            retry_delay: Duration::from_secs(env_parse(
                "RATE_ENGINE_RETRY_DELAY_SECS",
                d.retry_delay.as_secs(),
            )),
            storage_backend: env_or_default("RATE_ENGINE_STORAGE", &d.storage_backend.to_string()).parse()?,
            storage_mode: env_or_default("RATE_ENGINE_STORAGE_MODE", &d.storage_mode.to_string())
                .parse()?,
            redis_url: env_or_default("RATE_ENGINE_REDIS_URL", &d.redis_url),
            redis_key_prefix: env_or_default("RATE_ENGINE_REDIS_PREFIX", &d.redis_key_prefix),
            snapshot_dir: PathBuf::from(env_or_default(
                "RATE_ENGINE_SNAPSHOT_DIR",
                &d.snapshot_dir.to_string_lossy(),
            )),
            log_json: env_parse("RATE_ENGINE_LOG_JSON", d.log_json),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> RateResult<()> {
        if self.retry_attempts == 0 {
            return Err(RateError::Config("retry attempts must be at least 1".into()));
        }
        if self.render_timeout.is_zero() {
            return Err(RateError::Config("render timeout must be positive".into()));
        }
        for (name, url) in [
            ("deposit base URL", &self.deposit_base_url),
            ("loan listing base URL", &self.loan_listing_base_url),
        ] {
            url::Url::parse(url)
                .map_err(|e| RateError::Config(format!("invalid {name} {url:?}: {e}")))?;
        }
        if self.storage_backend == StorageBackend::Redis && self.redis_key_prefix.is_empty() {
            return Err(RateError::Config("redis key prefix must not be empty".into()));
        }
        Ok(())
    }

    pub fn deposit_url(&self, short_name: &str) -> String {
        format!("{}/{}", self.deposit_base_url.trim_end_matches('/'), short_name)
    }

    pub fn loan_listing_url(&self, short_name: &str) -> String {
        format!("{}/{}", self.loan_listing_base_url.trim_end_matches('/'), short_name)
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr + fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = key, value = raw.as_str(), "Unparseable setting, using default {}", default);
            default
        }),
        Err(_) => default,
    }
}
