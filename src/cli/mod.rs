//! CLI module for LQ-CORE commands.
//!
//! ## Usage
//!
//! ```bash
//! lq-core-cli load assets/manifest.json --root ./public
//! lq-core-cli config show
//! lq-core-cli config validate --config lq-core.toml
//! ```

pub mod config_cmd;
pub mod load_cmd;

pub use load_cmd::{run_load, LoadSummary};

/// Value following `--name` in `args`, if any.
pub fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// True when the bare flag `--name` is present.
pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

/// Positional arguments, skipping flags and the values they take.
pub fn positionals<'a>(args: &'a [String], value_flags: &[&str]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
        } else if value_flags.contains(&arg.as_str()) {
            skip = true;
        } else if !arg.starts_with("--") {
            out.push(arg.as_str());
        }
    }
    out
}
