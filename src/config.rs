//! Runtime configuration from environment variables and an optional TOML file.
//!
//! Values are layered: built-in defaults, then the file, then `LQ_CORE_*`
//! environment variables. Invalid environment values fall back to the layer
//! below without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `LQ_CORE_MAX_CONNECTIONS` | 1 | Max concurrent loads |
//! | `LQ_CORE_STOP_ON_ERROR` | false | Halt the queue on the first error |
//! | `LQ_CORE_MAINTAIN_SCRIPT_ORDER` | true | Report javascript items in order |
//! | `LQ_CORE_LOAD_TIMEOUT_MS` | 8000 | Default per-item timeout (ms) |
//! | `LQ_CORE_BASE_PATH` | unset | Prefix for relative sources |
//! | `LQ_CORE_ASSET_ROOT` | . | Root directory for file loads |
//! | `LQ_CORE_READ_CHUNK` | 65536 | File read chunk size (bytes) |
//! | `LQ_CORE_LOG` | info | Tracing filter |
//! | `LQ_CORE_LOG_FORMAT` | json | `json` or `pretty` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loaders::DEFAULT_READ_CHUNK;
use crate::scheduler::QueueConfig;
use crate::telemetry::{LogConfig, LogFormat};

const MIN_READ_CHUNK: usize = 512;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub max_connections: usize,
    pub stop_on_error: bool,
    pub maintain_script_order: bool,
    pub load_timeout_ms: u64,
    pub base_path: Option<String>,
    pub asset_root: PathBuf,
    pub read_chunk: usize,
    pub log_level: String,
    pub log_format: String,
}

/// All configuration after layering.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub queue: QueueConfig,
    pub log: LogConfig,
    /// Root directory for the file transport.
    pub asset_root: PathBuf,
    pub read_chunk: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            log: LogConfig::default(),
            asset_root: PathBuf::from("."),
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

/// On-disk layout. Every key is optional.
///
/// ```toml
/// [queue]
/// max_connections = 4
/// load_timeout_ms = 5000
///
/// [assets]
/// root = "public"
///
/// [log]
/// format = "pretty"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    queue: FileQueue,
    assets: FileAssets,
    log: FileLog,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileQueue {
    max_connections: Option<usize>,
    stop_on_error: Option<bool>,
    maintain_script_order: Option<bool>,
    load_timeout_ms: Option<u64>,
    base_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileAssets {
    root: Option<PathBuf>,
    read_chunk: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLog {
    level: Option<String>,
    format: Option<String>,
    output_path: Option<PathBuf>,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/true/yes/on`, `0/false/no/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn parse_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn apply_file(cfg: &mut EnvConfig, file: FileConfig) -> Result<(), ConfigError> {
    let q = file.queue;
    if let Some(v) = q.max_connections {
        cfg.queue.max_connections = v;
    }
    if let Some(v) = q.stop_on_error {
        cfg.queue.stop_on_error = v;
    }
    if let Some(v) = q.maintain_script_order {
        cfg.queue.maintain_script_order = v;
    }
    if let Some(v) = q.load_timeout_ms {
        cfg.queue.load_timeout = Duration::from_millis(v);
    }
    if q.base_path.is_some() {
        cfg.queue.base_path = q.base_path;
    }

    if let Some(root) = file.assets.root {
        cfg.asset_root = root;
    }
    if let Some(v) = file.assets.read_chunk {
        cfg.read_chunk = v;
    }

    if let Some(level) = file.log.level {
        cfg.log.level = level;
    }
    if let Some(format) = file.log.format {
        cfg.log.format = format.parse().map_err(|e: crate::telemetry::LogError| {
            ConfigError::Invalid {
                key: "log.format",
                reason: e.to_string(),
            }
        })?;
    }
    if file.log.output_path.is_some() {
        cfg.log.output_path = file.log.output_path;
    }
    Ok(())
}

fn apply_env(cfg: &mut EnvConfig) {
    let q = &mut cfg.queue;
    q.max_connections = parse_usize("LQ_CORE_MAX_CONNECTIONS", q.max_connections);
    q.stop_on_error = parse_bool("LQ_CORE_STOP_ON_ERROR", q.stop_on_error);
    q.maintain_script_order = parse_bool("LQ_CORE_MAINTAIN_SCRIPT_ORDER", q.maintain_script_order);
    let timeout_ms = parse_u64("LQ_CORE_LOAD_TIMEOUT_MS", q.load_timeout.as_millis() as u64);
    q.load_timeout = Duration::from_millis(timeout_ms);
    if let Some(base) = parse_string("LQ_CORE_BASE_PATH") {
        q.base_path = Some(base);
    }

    if let Some(root) = parse_string("LQ_CORE_ASSET_ROOT") {
        cfg.asset_root = PathBuf::from(root);
    }
    cfg.read_chunk = parse_usize("LQ_CORE_READ_CHUNK", cfg.read_chunk);

    if let Some(level) = parse_string("LQ_CORE_LOG") {
        cfg.log.level = level;
    }
    if let Some(format) = parse_string("LQ_CORE_LOG_FORMAT") {
        cfg.log.format = format.parse().unwrap_or(cfg.log.format);
    }
}

/// Enforce floors after all layers are applied.
fn clamp(cfg: &mut EnvConfig) {
    cfg.queue.max_connections = cfg.queue.max_connections.max(1);
    cfg.queue.load_timeout = cfg.queue.load_timeout.max(Duration::from_millis(1));
    cfg.read_chunk = cfg.read_chunk.max(MIN_READ_CHUNK);
}

/// Load configuration from environment variables over built-in defaults.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let mut cfg = EnvConfig::default();
    apply_env(&mut cfg);
    clamp(&mut cfg);
    cfg
}

/// Load configuration with an optional TOML file between defaults and env.
pub fn load_with_file(path: Option<&Path>) -> Result<EnvConfig, ConfigError> {
    let mut cfg = EnvConfig::default();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        apply_file(&mut cfg, file)?;
    }
    apply_env(&mut cfg);
    clamp(&mut cfg);
    Ok(cfg)
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            max_connections: self.queue.max_connections,
            stop_on_error: self.queue.stop_on_error,
            maintain_script_order: self.queue.maintain_script_order,
            load_timeout_ms: self.queue.load_timeout.as_millis() as u64,
            base_path: self.queue.base_path.clone(),
            asset_root: self.asset_root.clone(),
            read_chunk: self.read_chunk,
            log_level: self.log.level.clone(),
            log_format: self.log.format.as_str().to_string(),
        }
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        EnvConfig::default().effective_config()
    }
}

/// Serializes tests that mutate `LQ_CORE_*` variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) const ENV_KEYS: &[&str] = &[
    "LQ_CORE_MAX_CONNECTIONS",
    "LQ_CORE_STOP_ON_ERROR",
    "LQ_CORE_MAINTAIN_SCRIPT_ORDER",
    "LQ_CORE_LOAD_TIMEOUT_MS",
    "LQ_CORE_BASE_PATH",
    "LQ_CORE_ASSET_ROOT",
    "LQ_CORE_READ_CHUNK",
    "LQ_CORE_LOG",
    "LQ_CORE_LOG_FORMAT",
];

#[cfg(test)]
pub(crate) fn clear_env_vars() {
    for k in ENV_KEYS {
        std::env::remove_var(k);
    }
}
