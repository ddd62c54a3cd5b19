//! `load` subcommand: load a manifest from disk and report the outcome.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::{flag_value, has_flag, positionals};
use crate::config::{self, EnvConfig};
use crate::events::QueueEvent;
use crate::loaders::{FileTransport, LoaderRegistry};
use crate::scheduler::{EntrySnapshot, EntryState, LoadQueue, QueueError};
use crate::telemetry::{self, MetricsSnapshot};

/// Outcome of one `load` run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    pub canceled: usize,
    pub pending: usize,
    pub progress: f64,
    /// Stopped by a signal before settling on its own.
    pub interrupted: bool,
    pub items: Vec<EntrySnapshot>,
    pub metrics: MetricsSnapshot,
}

impl LoadSummary {
    pub fn succeeded(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }
}

/// Build the file-backed queue described by `cfg`.
pub fn build_queue(cfg: &EnvConfig, root: &Path) -> LoadQueue {
    let transport = FileTransport::new(root).with_chunk_size(cfg.read_chunk);
    let registry = Arc::new(LoaderRegistry::with_defaults(Arc::new(transport)));
    LoadQueue::new(registry, cfg.queue.clone())
}

fn log_event(event: &QueueEvent) {
    match event {
        QueueEvent::LoadStart => tracing::info!("loading started"),
        QueueEvent::FileStart { item } => tracing::debug!(src = %item.src, "file started"),
        QueueEvent::FileProgress { item, progress } => {
            tracing::trace!(src = %item.src, progress, "file progress")
        }
        QueueEvent::FileLoad { item, content } => tracing::info!(
            id = item.key(),
            src = %item.src,
            bytes = content.raw_len(),
            "file loaded"
        ),
        QueueEvent::Progress {
            loaded,
            total,
            progress,
        } => tracing::debug!(loaded, total, progress, "queue progress"),
        QueueEvent::Error { item, error } => tracing::error!(
            id = item.key(),
            src = %item.src,
            kind = error.kind().as_str(),
            error = %error,
            "file failed"
        ),
        QueueEvent::Complete => tracing::info!("loading complete"),
    }
}

/// Load `manifest` until the queue settles or `shutdown` resolves.
///
/// On shutdown the queue is closed, which cancels in-flight loads.
pub async fn execute<F>(
    cfg: &EnvConfig,
    root: &Path,
    manifest: &str,
    shutdown: F,
) -> Result<LoadSummary, QueueError>
where
    F: Future<Output = ()>,
{
    let queue = build_queue(cfg, root);
    queue.events().on_any(log_event);
    queue.load_manifest_file(manifest, true)?;

    let interrupted = tokio::select! {
        settled = queue.wait_settled() => {
            settled?;
            false
        }
        _ = shutdown => {
            tracing::warn!("interrupted, closing queue");
            queue.close()?;
            queue.wait_settled().await?;
            true
        }
    };

    let snapshot = queue.snapshot().await?;
    Ok(LoadSummary {
        total: snapshot.total,
        loaded: snapshot.count(EntryState::Loaded),
        failed: snapshot.count(EntryState::Error),
        canceled: snapshot.count(EntryState::Canceled),
        pending: snapshot.count(EntryState::Pending),
        progress: snapshot.progress,
        interrupted,
        items: snapshot.entries,
        metrics: telemetry::metrics_snapshot(),
    })
}

fn print_usage() {
    eprintln!("Usage: lq-core-cli load <MANIFEST> [--root DIR] [--config FILE] [--quiet]");
}

/// Run the `load` command. `args` are the arguments after `load`.
///
/// Exit codes: 0 all items loaded, 1 an item failed or the run was
/// interrupted, 2 usage or configuration error.
pub async fn run_load(args: &[String]) -> i32 {
    let positional = positionals(args, &["--root", "--config"]);
    let Some(manifest) = positional.first().copied() else {
        print_usage();
        return 2;
    };

    let config_path = flag_value(args, "--config").map(PathBuf::from);
    let cfg = match config::load_with_file(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return 2;
        }
    };
    if let Err(e) = telemetry::init_logging(&cfg.log) {
        eprintln!("Logging disabled: {}", e);
    }

    let root = flag_value(args, "--root")
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.asset_root.clone());
    tracing::info!(manifest, root = %root.display(), "loading manifest");

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let summary = match execute(&cfg, &root, manifest, shutdown).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if !has_flag(args, "--quiet") {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode summary: {}", e),
        }
    }
    if summary.succeeded() {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_execute_loads_manifest_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "manifest.json",
            r#"{"path": "data/", "manifest": ["a.txt", {"id": "cfg", "src": "cfg.json"}]}"#,
        );
        write(dir.path(), "data/a.txt", "alpha");
        write(dir.path(), "data/cfg.json", r#"{"ok": true}"#);

        let cfg = EnvConfig::default();
        let summary = execute(&cfg, dir.path(), "manifest.json", std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.loaded, 3);
        assert!(summary.succeeded());
        assert_eq!(summary.progress, 1.0);
    }

    #[tokio::test]
    async fn test_execute_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "manifest.json", r#"["here.txt", "gone.txt"]"#);
        write(dir.path(), "here.txt", "x");

        let cfg = EnvConfig::default();
        let summary = execute(&cfg, dir.path(), "manifest.json", std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.succeeded());
        let gone = summary.items.iter().find(|i| i.id == "gone.txt").unwrap();
        assert_eq!(gone.state, EntryState::Error);
    }

    #[tokio::test]
    async fn test_run_load_without_manifest_is_usage_error() {
        assert_eq!(run_load(&[]).await, 2);
    }
}
