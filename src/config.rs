use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dispatch::DispatchMode;
use crate::error::Result;
use crate::storage::codec::Format;

/// Env var naming the YAML configuration file.
pub const CONFIG_ENV: &str = "TIERSERVE_CONFIG";
/// Env var overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub static_files: StaticConfig,
    pub dispatch: DispatchConfig,
    pub auth: AuthConfig,
}

/// How many reads a connection performs per readiness event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Read until the socket reports would-block.
    #[default]
    Edge,
    /// One read per readiness event.
    Level,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub trigger: TriggerMode,
    /// Connections with no readiness for this long are closed.
    pub idle_timeout_secs: u64,
    /// Upper bound on a buffered request (headers plus body).
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            trigger: TriggerMode::Edge,
            idle_timeout_secs: 15,
            max_request_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Public prefix; object keys are `download_prefix + filename`.
    pub download_prefix: String,
    /// Plain tier.
    pub low_storage_dir: PathBuf,
    /// Archive tier.
    pub deep_storage_dir: PathBuf,
    /// Index persistence file.
    pub storage_info: PathBuf,
    pub bundle_format: Format,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_prefix: "/download/".to_string(),
            low_storage_dir: PathBuf::from("./low_storage/"),
            deep_storage_dir: PathBuf::from("./deep_storage/"),
            storage_info: PathBuf::from("./storage.data"),
            bundle_format: Format::Lz4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub doc_root: PathBuf,
    /// Served in place of a bare `/`.
    pub default_document: String,
    pub monitor_page: String,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            doc_root: PathBuf::from("./root"),
            default_document: "judge.html".to_string(),
            monitor_page: "monitor.html".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub workers: usize,
    pub max_requests: usize,
    pub mode: DispatchMode,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_requests: 10_000,
            mode: DispatchMode::Reactor,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// YAML map of `user: password` used to seed the credential store.
    pub users_file: Option<PathBuf>,
}

impl Config {
    /// Loads the file named by `TIERSERVE_CONFIG` (or `config.yaml`),
    /// falling back to defaults when it does not exist, then applies the
    /// `LISTEN` override.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut cfg = Self::load_from(&path)?;

        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            cfg.server.listen_addr = addr;
        }

        Ok(cfg)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}
