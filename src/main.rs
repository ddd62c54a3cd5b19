//! LQ-CORE command line entry point.
//!
//! ## CLI Subcommands
//!
//! - `lq-core-cli load <MANIFEST>` - Load a manifest from disk
//! - `lq-core-cli config show|defaults|validate` - Inspect configuration
//! - `lq-core-cli help [COMMAND]`, `lq-core-cli version`

use std::path::PathBuf;
use std::process::ExitCode;

use lq_core::cli::{config_cmd, flag_value, has_flag, run_load};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let rest = args.get(2..).unwrap_or(&[]);

    match command {
        "load" => {
            if has_flag(rest, "--help") || has_flag(rest, "-h") {
                print_command_help("load");
                return ExitCode::SUCCESS;
            }
            let code = run_load(rest).await;
            ExitCode::from(code as u8)
        }
        "config" => {
            let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("show");
            let config_path = flag_value(rest, "--config").map(PathBuf::from);
            let json = has_flag(rest, "--json");
            match subcommand {
                "show" => {
                    let code = config_cmd::run_show(config_path.as_deref(), json);
                    ExitCode::from(code as u8)
                }
                "defaults" => {
                    config_cmd::run_defaults(json);
                    ExitCode::SUCCESS
                }
                "validate" => {
                    let code = config_cmd::run_validate(config_path.as_deref());
                    ExitCode::from(code as u8)
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = rest.first() {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("lq-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "lq-core - Asset load queue v{}

USAGE:
    lq-core-cli <COMMAND> [OPTIONS]

COMMANDS:
    load         Load a manifest and print a JSON summary
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    lq-core-cli load manifest.json --root ./public
    lq-core-cli config show --json
    lq-core-cli config validate --config lq-core.toml

ENVIRONMENT:
    LQ_CORE_MAX_CONNECTIONS   Max concurrent loads (default: 1)
    LQ_CORE_ASSET_ROOT        Root directory for file loads (default: .)
    LQ_CORE_LOG               Tracing filter (default: info)
    LQ_CORE_LOG_FORMAT        json or pretty (default: json)
    See 'lq-core-cli help config' for the full list.

EXIT CODES:
    0  Success
    1  An item failed, or the load was interrupted
    2  Usage or configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "load" => {
            eprintln!(
                "lq-core-cli load - Load a manifest from disk

USAGE:
    lq-core-cli load <MANIFEST> [OPTIONS]

OPTIONS:
    --root DIR      Asset root (overrides LQ_CORE_ASSET_ROOT)
    --config FILE   TOML configuration file
    --quiet         Do not print the summary

DESCRIPTION:
    Queues MANIFEST (relative to the asset root), loads every item it lists
    and prints a JSON summary with per-item state and metrics. Ctrl-C cancels
    in-flight loads and exits with status 1.
"
            );
        }
        "config" => {
            eprintln!(
                "lq-core-cli config - Inspect configuration

USAGE:
    lq-core-cli config <SUBCOMMAND> [--config FILE] [--json]

SUBCOMMANDS:
    show           Show effective configuration (defaults < file < env)
    defaults       Show built-in defaults
    validate       Check for misconfiguration (exit 1 on warnings)

VARIABLES:
    LQ_CORE_MAX_CONNECTIONS        1
    LQ_CORE_STOP_ON_ERROR          false
    LQ_CORE_MAINTAIN_SCRIPT_ORDER  true
    LQ_CORE_LOAD_TIMEOUT_MS        8000
    LQ_CORE_BASE_PATH              (unset)
    LQ_CORE_ASSET_ROOT             .
    LQ_CORE_READ_CHUNK             65536
    LQ_CORE_LOG                    info
    LQ_CORE_LOG_FORMAT             json
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'lq-core-cli help' for general usage.",
                command
            );
        }
    }
}
