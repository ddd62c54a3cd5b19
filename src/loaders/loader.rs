//! Loader capability contract and the per-item loader state machine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::content::LoadedContent;
use super::error::{LoadError, LoaderStateError};
use crate::items::LoadItem;
use crate::telemetry::{LoadSpan, SpanExt};

/// Identifies one started load within a queue.
pub type Ticket = u64;

/// Capability every per-type loader provides: fetch and decode one item.
///
/// Implementations report progress through the [`ProgressReporter`] and must
/// not retry internally.
#[async_trait::async_trait]
pub trait Loader: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn load(
        &self,
        item: &LoadItem,
        progress: &ProgressReporter,
    ) -> Result<LoadedContent, LoadError>;
}

/// Notification sent from a running load back to its owner.
#[derive(Debug)]
pub enum LoaderEvent {
    Progress(f64),
    Finished(Result<LoadedContent, LoadError>),
}

#[derive(Debug)]
pub struct LoaderReport {
    pub ticket: Ticket,
    pub event: LoaderEvent,
}

/// Destination for loader reports.
pub type ReportSink = Arc<dyn Fn(LoaderReport) + Send + Sync>;

/// Progress channel handed to a [`Loader`]. Silent once the load is canceled.
#[derive(Clone)]
pub struct ProgressReporter {
    ticket: Ticket,
    sink: Option<ReportSink>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("ticket", &self.ticket)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

impl ProgressReporter {
    /// Reporter that discards everything, for driving a loader directly.
    pub fn detached() -> Self {
        Self {
            ticket: 0,
            sink: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Report completion fraction in `0.0..=1.0`.
    pub fn report(&self, fraction: f64) {
        if self.is_canceled() || !fraction.is_finite() {
            return;
        }
        if let Some(sink) = &self.sink {
            sink(LoaderReport {
                ticket: self.ticket,
                event: LoaderEvent::Progress(fraction.clamp(0.0, 1.0)),
            });
        }
    }

    /// Report byte progress. Unknown or zero totals report nothing.
    pub fn report_bytes(&self, loaded: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => self.report(loaded as f64 / total as f64),
            _ => {}
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Lifecycle of an [`ItemLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderStatus {
    Idle,
    Loading,
    Loaded,
    Error,
    Canceled,
}

impl LoaderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Error | Self::Canceled)
    }
}

/// Stateful worker executing one item's fetch and decode.
///
/// `load` may be called once. `cancel` is idempotent; after it no report from
/// the running task is delivered, though work already handed off by the loader
/// may still run to completion in the background.
pub struct ItemLoader {
    ticket: Ticket,
    item: Arc<LoadItem>,
    loader: Arc<dyn Loader>,
    timeout: Duration,
    status: LoaderStatus,
    progress: f64,
    result: Option<Arc<LoadedContent>>,
    error: Option<Arc<LoadError>>,
    cancel: CancellationToken,
    started_at: Option<Instant>,
}

impl std::fmt::Debug for ItemLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemLoader")
            .field("ticket", &self.ticket)
            .field("src", &self.item.src)
            .field("loader", &self.loader.name())
            .field("status", &self.status)
            .field("progress", &self.progress)
            .finish()
    }
}

impl ItemLoader {
    pub fn new(
        ticket: Ticket,
        item: Arc<LoadItem>,
        loader: Arc<dyn Loader>,
        timeout: Duration,
    ) -> Self {
        Self {
            ticket,
            item,
            loader,
            timeout,
            status: LoaderStatus::Idle,
            progress: 0.0,
            result: None,
            error: None,
            cancel: CancellationToken::new(),
            started_at: None,
        }
    }

    /// Start the load on a spawned task. Reports are delivered to `sink`.
    pub fn load(&mut self, sink: ReportSink) -> Result<(), LoaderStateError> {
        if self.status != LoaderStatus::Idle {
            return Err(LoaderStateError::AlreadyStarted);
        }
        self.status = LoaderStatus::Loading;
        self.started_at = Some(Instant::now());

        let ticket = self.ticket;
        let item = Arc::clone(&self.item);
        let loader = Arc::clone(&self.loader);
        let token = self.cancel.clone();
        let timeout = self.timeout;
        let reporter = ProgressReporter {
            ticket,
            sink: Some(Arc::clone(&sink)),
            cancel: token.clone(),
        };
        let span = LoadSpan::new(ticket, &item.src, item.resolved_type());
        let task_span = span.clone();

        tokio::spawn(
            async move {
                let started = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        tracing::debug!(loader = loader.name(), "load canceled");
                        return;
                    }
                    res = tokio::time::timeout(timeout, loader.load(&item, &reporter)) => match res {
                        Ok(outcome) => outcome,
                        Err(_) => Err(LoadError::Timeout(timeout.as_millis() as u64)),
                    },
                };

                task_span.record("latency_ms", started.elapsed().as_millis() as u64);
                if let Ok(content) = &outcome {
                    task_span.record("bytes", content.raw_len() as u64);
                }
                task_span.record_result(&outcome);

                if token.is_cancelled() {
                    return;
                }
                sink(LoaderReport {
                    ticket,
                    event: LoaderEvent::Finished(outcome),
                });
            }
            .instrument(span),
        );
        Ok(())
    }

    /// Request early termination. Safe before, during, and after loading.
    pub fn cancel(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = LoaderStatus::Canceled;
        self.cancel.cancel();
    }

    /// Fold a report into the loader state. Returns false when it was ignored.
    pub fn apply(&mut self, event: LoaderEvent) -> bool {
        if self.status != LoaderStatus::Loading {
            return false;
        }
        match event {
            LoaderEvent::Progress(fraction) => {
                if fraction <= self.progress {
                    return false;
                }
                self.progress = fraction;
            }
            LoaderEvent::Finished(Ok(content)) => {
                self.status = LoaderStatus::Loaded;
                self.progress = 1.0;
                self.result = Some(Arc::new(content));
            }
            LoaderEvent::Finished(Err(err)) => {
                self.status = LoaderStatus::Error;
                self.progress = 1.0;
                self.error = Some(Arc::new(err));
            }
        }
        true
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn item(&self) -> &Arc<LoadItem> {
        &self.item
    }

    pub fn loader_name(&self) -> &'static str {
        self.loader.name()
    }

    pub fn status(&self) -> LoaderStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Decoded result; `None` until the load succeeded.
    pub fn result(&self) -> Option<&Arc<LoadedContent>> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&Arc<LoadError>> {
        self.error.as_ref()
    }

    /// Time since `load` was called.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }
}

impl Drop for ItemLoader {
    fn drop(&mut self) {
        if self.status == LoaderStatus::Loading {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::AssetValue;
    use tokio::sync::mpsc;

    struct EchoLoader {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Loader for EchoLoader {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn load(
            &self,
            item: &LoadItem,
            progress: &ProgressReporter,
        ) -> Result<LoadedContent, LoadError> {
            progress.report(0.5);
            tokio::time::sleep(self.delay).await;
            Ok(LoadedContent::new(AssetValue::Text(item.src.clone())))
        }
    }

    fn channel_sink() -> (ReportSink, mpsc::UnboundedReceiver<LoaderReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: ReportSink = Arc::new(move |report| {
            let _ = tx.send(report);
        });
        (sink, rx)
    }

    fn echo(delay_ms: u64, timeout_ms: u64) -> ItemLoader {
        ItemLoader::new(
            7,
            Arc::new(LoadItem::new("a.txt")),
            Arc::new(EchoLoader { delay: Duration::from_millis(delay_ms) }),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn load_reports_progress_then_result() {
        let mut loader = echo(1, 1000);
        let (sink, mut rx) = channel_sink();
        loader.load(sink).unwrap();
        assert!(loader.result().is_none());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.ticket, 7);
        assert!(loader.apply(first.event));
        assert_eq!(loader.progress(), 0.5);

        let done = rx.recv().await.unwrap();
        assert!(loader.apply(done.event));
        assert_eq!(loader.status(), LoaderStatus::Loaded);
        assert_eq!(
            loader.result().unwrap().value().as_text(),
            Some("a.txt")
        );
    }

    #[tokio::test]
    async fn load_twice_is_rejected() {
        let mut loader = echo(1, 1000);
        let (sink, _rx) = channel_sink();
        loader.load(Arc::clone(&sink)).unwrap();
        assert_eq!(loader.load(sink), Err(LoaderStateError::AlreadyStarted));
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_silences_reports() {
        let mut loader = echo(50, 1000);
        let (sink, mut rx) = channel_sink();
        loader.load(sink).unwrap();
        loader.cancel();
        loader.cancel();
        assert_eq!(loader.status(), LoaderStatus::Canceled);

        let next = tokio::time::timeout(Duration::from_millis(150), async {
            while let Some(report) = rx.recv().await {
                if matches!(report.event, LoaderEvent::Finished(_)) {
                    return true;
                }
            }
            false
        })
        .await;
        assert!(!matches!(next, Ok(true)), "no completion after cancel");
        assert!(!loader.apply(LoaderEvent::Progress(0.9)));
    }

    #[tokio::test]
    async fn slow_load_times_out() {
        let mut loader = echo(500, 20);
        let (sink, mut rx) = channel_sink();
        loader.load(sink).unwrap();
        loop {
            let report = rx.recv().await.unwrap();
            if let LoaderEvent::Finished(outcome) = report.event {
                assert!(matches!(outcome, Err(LoadError::Timeout(20))));
                break;
            }
        }
    }

    #[test]
    fn cancel_before_load_prevents_start() {
        let mut loader = echo(1, 1000);
        loader.cancel();
        let (sink, _rx) = channel_sink();
        assert!(loader.load(sink).is_err());
        assert_eq!(loader.status(), LoaderStatus::Canceled);
    }
}
