use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

/// Connection settings for the hosted KB service.
///
/// The API key itself is never stored in the config file; `api_key_env`
/// names the environment variable that holds it.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_key_env() -> String {
    "KB_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

/// Batch upload settings.
///
/// Enumeration is non-recursive by default (`recursive = false`): only files
/// directly inside `data_dir` that match `include_globs` are candidates.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            include_globs: default_include_globs(),
            recursive: false,
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.pdf".to_string()]
}
fn default_max_in_flight() -> usize {
    4
}

/// Completion polling settings.
///
/// The poll interval grows geometrically from `initial_interval_secs` by
/// `backoff_factor` per still-processing poll, capped at `max_interval_secs`.
/// `max_wait_secs` is a hard wall-clock deadline for one job.
#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_initial_interval")]
    pub initial_interval_secs: f64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: f64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_secs: default_initial_interval(),
            backoff_factor: default_backoff_factor(),
            max_interval_secs: default_max_interval(),
            max_wait_secs: default_max_wait(),
            transient_retries: default_transient_retries(),
        }
    }
}

fn default_initial_interval() -> f64 {
    2.0
}
fn default_backoff_factor() -> f64 {
    1.5
}
fn default_max_interval() -> f64 {
    30.0
}
fn default_max_wait() -> u64 {
    900
}
fn default_transient_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            rrf_k: default_rrf_k(),
        }
    }
}

fn default_page_size() -> usize {
    5
}
fn default_rrf_k() -> f64 {
    60.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    20
}

/// REST server settings. When the environment variable named by
/// `api_key_env` is set, requests must present its value in `X-API-Key`;
/// when it is unset, authentication is disabled for local use.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_server_api_key_env")]
    pub api_key_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key_env: default_server_api_key_env(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_server_api_key_env() -> String {
    "API_KEY".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate remote
    if config.remote.base_url.trim().is_empty() {
        anyhow::bail!("remote.base_url must not be empty");
    }
    while config.remote.base_url.ends_with('/') {
        config.remote.base_url.pop();
    }

    // Validate upload
    if config.upload.max_in_flight == 0 {
        anyhow::bail!("upload.max_in_flight must be >= 1");
    }
    if config.upload.include_globs.is_empty() {
        anyhow::bail!("upload.include_globs must not be empty");
    }

    // Validate poll
    if config.poll.initial_interval_secs <= 0.0 {
        anyhow::bail!("poll.initial_interval_secs must be > 0");
    }
    if config.poll.backoff_factor < 1.0 {
        anyhow::bail!("poll.backoff_factor must be >= 1.0");
    }
    if config.poll.max_interval_secs < config.poll.initial_interval_secs {
        anyhow::bail!("poll.max_interval_secs must be >= poll.initial_interval_secs");
    }
    if config.poll.max_wait_secs == 0 {
        anyhow::bail!("poll.max_wait_secs must be >= 1");
    }

    // Validate search
    if config.search.page_size == 0 {
        anyhow::bail!("search.page_size must be >= 1");
    }
    if config.search.rrf_k <= 0.0 {
        anyhow::bail!("search.rrf_k must be > 0");
    }

    // Validate cache
    if config.cache.capacity == 0 {
        anyhow::bail!("cache.capacity must be >= 1");
    }

    Ok(config)
}
