//! Config CLI subcommands: show, defaults, validate.
//!
//! These read configuration from the environment and an optional TOML file
//! without starting a queue.

use std::path::Path;
use std::time::Duration;

use crate::config::{self, EffectiveConfig, EnvConfig};

/// Print effective config as key-value pairs (or JSON) to stdout.
pub fn run_show(config_path: Option<&Path>, json: bool) -> i32 {
    match config::load_with_file(config_path) {
        Ok(env) => {
            print_config(&env.effective_config(), json);
            0
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            2
        }
    }
}

/// Print built-in defaults, ignoring the environment.
pub fn run_defaults(json: bool) {
    print_config(&EffectiveConfig::default(), json);
}

/// Check configuration for obvious misconfigurations.
pub fn warnings(env: &EnvConfig) -> Vec<String> {
    let mut out = Vec::new();
    if !env.asset_root.is_dir() {
        out.push(format!(
            "LQ_CORE_ASSET_ROOT ({}) is not a directory; file loads will fail",
            env.asset_root.display()
        ));
    }
    if let Some(base) = &env.queue.base_path {
        if base.contains("://") {
            out.push(format!(
                "LQ_CORE_BASE_PATH ({}) is a URL; the file transport only reads local paths",
                base
            ));
        }
    }
    if env.queue.load_timeout < Duration::from_millis(100) {
        out.push(format!(
            "LQ_CORE_LOAD_TIMEOUT_MS ({}) is below 100ms; most loads will time out",
            env.queue.load_timeout.as_millis()
        ));
    }
    if env.queue.max_connections > 64 {
        out.push(format!(
            "LQ_CORE_MAX_CONNECTIONS ({}) exceeds 64; loads compete for file handles",
            env.queue.max_connections
        ));
    }
    out
}

/// Validate configuration.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if the file is unreadable.
pub fn run_validate(config_path: Option<&Path>) -> i32 {
    let env = match config::load_with_file(config_path) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 2;
        }
    };
    let found = warnings(&env);
    for warning in &found {
        eprintln!("WARNING: {}", warning);
    }
    if found.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn config_lines(cfg: &EffectiveConfig) -> Vec<String> {
    vec![
        format!("LQ_CORE_MAX_CONNECTIONS={}", cfg.max_connections),
        format!("LQ_CORE_STOP_ON_ERROR={}", cfg.stop_on_error),
        format!("LQ_CORE_MAINTAIN_SCRIPT_ORDER={}", cfg.maintain_script_order),
        format!("LQ_CORE_LOAD_TIMEOUT_MS={}", cfg.load_timeout_ms),
        format!(
            "LQ_CORE_BASE_PATH={}",
            cfg.base_path.as_deref().unwrap_or("")
        ),
        format!("LQ_CORE_ASSET_ROOT={}", cfg.asset_root.display()),
        format!("LQ_CORE_READ_CHUNK={}", cfg.read_chunk),
        format!("LQ_CORE_LOG={}", cfg.log_level),
        format!("LQ_CORE_LOG_FORMAT={}", cfg.log_format),
    ]
}

fn print_config(cfg: &EffectiveConfig, json: bool) {
    if json {
        match serde_json::to_string_pretty(cfg) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode config: {}", e),
        }
        return;
    }
    for line in config_lines(cfg) {
        println!("{}", line);
    }
}
