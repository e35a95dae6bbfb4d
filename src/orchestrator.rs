//! Parallel image pulls
//!
//! [`PullOrchestrator`] owns everything the pull tasks share: the engine handle,
//! the worker pool, the completion barrier and the root cancellation token. Its
//! lifecycle is construct, [`run`](PullOrchestrator::run) once,
//! [`release`](PullOrchestrator::release).
//!
//! Failures are scoped to the image they belong to. A failed pull is logged,
//! its progress is finalized at 100% and the batch carries on.

use crate::concurrency::{CompletionBarrier, CompletionSignal, PoolError, WorkerPool};
use crate::engine::ImageEngine;
use crate::error::{MultipullError, PullError, Result};
use crate::logging::Logger;
use crate::progress::{ImageProgress, ProgressSink, decode_events};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Work item for one image reference
pub struct PullTask {
    index: usize,
    reference: String,
    cancel: CancellationToken,
    signal: CompletionSignal,
    reports: mpsc::UnboundedSender<PullReport>,
}

/// How the pull of one image ended
#[derive(Debug)]
pub struct PullReport {
    pub index: usize,
    pub reference: String,
    pub status: String,
    pub percent: u8,
    pub outcome: std::result::Result<(), PullError>,
}

impl PullReport {
    fn from_progress(
        index: usize,
        progress: &ImageProgress,
        outcome: std::result::Result<(), PullError>,
    ) -> Self {
        Self {
            index,
            reference: progress.reference().to_string(),
            status: progress.status().to_string(),
            percent: progress.percent(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Reports for a whole batch, in submission order
#[derive(Debug, Default)]
pub struct PullSummary {
    pub reports: Vec<PullReport>,
}

impl PullSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PullReport> {
        self.reports.iter().filter(|r| !r.is_success())
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

pub struct PullOrchestrator<E: ImageEngine> {
    engine: Arc<E>,
    pool: WorkerPool<PullTask>,
    barrier: CompletionBarrier,
    cancel: CancellationToken,
    sink: Arc<dyn ProgressSink>,
    logger: Logger,
}

impl<E: ImageEngine> PullOrchestrator<E> {
    /// Build the worker pool. Fails only for a zero concurrency limit.
    pub fn new(
        engine: Arc<E>,
        concurrency: usize,
        sink: Arc<dyn ProgressSink>,
        logger: Logger,
    ) -> std::result::Result<Self, PoolError> {
        let logger = logger.scoped("pull");

        let pool = {
            let engine = Arc::clone(&engine);
            let sink = Arc::clone(&sink);
            let logger = logger.clone();
            WorkerPool::new(concurrency, move |task: PullTask| {
                let engine = Arc::clone(&engine);
                let sink = Arc::clone(&sink);
                let logger = logger.clone();
                async move { run_task(engine.as_ref(), sink.as_ref(), &logger, task).await }
            })?
        };

        Ok(Self {
            engine,
            pool,
            barrier: CompletionBarrier::new(),
            cancel: CancellationToken::new(),
            sink,
            logger,
        })
    }

    /// Use `token` as the root token; cancelling it stops every pull
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn concurrency(&self) -> usize {
        self.pool.capacity()
    }

    /// Pull every reference and wait for all of them to finish.
    ///
    /// Submission blocks while all workers are busy. Per-image failures end up
    /// in the summary; only an empty reference list is an error. After
    /// cancellation the orchestrator rejects further work.
    pub async fn run(&self, references: &[String]) -> Result<PullSummary> {
        if references.is_empty() {
            return Err(MultipullError::Usage("no image references given".to_string()));
        }

        let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();
        let mut reports = Vec::with_capacity(references.len());

        for (index, reference) in references.iter().enumerate() {
            let task = PullTask {
                index,
                reference: reference.clone(),
                cancel: self.cancel.child_token(),
                signal: self.barrier.add(),
                reports: reports_tx.clone(),
            };

            self.logger.debug(&format!(
                "submitting {} ({}/{} workers busy)",
                reference,
                self.pool.running(),
                self.pool.capacity()
            ));
            // A rejected task is dropped unrun, which fires its completion signal.
            if let Err(e) = self.submit(task).await {
                self.logger.error(&format!("error pulling image {}: {}", reference, e));
                reports.push(self.rejected(index, reference, e));
            }
        }
        drop(reports_tx);

        self.barrier.wait().await;

        while let Ok(report) = reports_rx.try_recv() {
            reports.push(report);
        }

        Ok(PullSummary {
            reports: self.complete(references, reports),
        })
    }

    /// Wait for a free worker. Once the root token is cancelled the pool is
    /// closed, so images that were never admitted are rejected instead of run.
    async fn submit(&self, task: PullTask) -> std::result::Result<(), PoolError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.pool.release();
                Err(PoolError::Closed)
            }
            admitted = self.pool.invoke(task) => admitted.map(drop),
        }
    }

    /// One report per reference, in submission order. A task that died without
    /// reporting (a panicking sink, for instance) is recorded as aborted.
    fn complete(&self, references: &[String], reports: Vec<PullReport>) -> Vec<PullReport> {
        let mut slots: Vec<Option<PullReport>> = references.iter().map(|_| None).collect();
        for report in reports {
            if let Some(slot) = slots.get_mut(report.index) {
                *slot = Some(report);
            }
        }

        slots
            .into_iter()
            .zip(references)
            .enumerate()
            .map(|(index, (report, reference))| {
                report.unwrap_or_else(|| self.aborted(index, reference))
            })
            .collect()
    }

    fn aborted(&self, index: usize, reference: &str) -> PullReport {
        let error = PullError::Aborted;
        self.logger.error(&format!("{}: {}", reference, error));
        let mut progress = ImageProgress::new(reference);
        progress.fail(error.to_string());
        progress.finish();
        PullReport::from_progress(index, &progress, Err(error))
    }

    fn rejected(&self, index: usize, reference: &str, error: PoolError) -> PullReport {
        let error = PullError::Rejected(error);
        let mut progress = ImageProgress::new(reference);
        progress.fail(error.to_string());
        progress.finish();
        self.sink.finish(&progress);
        PullReport::from_progress(index, &progress, Err(error))
    }

    /// Stop the pool and hand back the engine handle
    pub fn release(self) -> Arc<E> {
        self.pool.release();
        self.logger.debug("worker pool released");
        self.engine
    }
}

async fn run_task<E: ImageEngine>(
    engine: &E,
    sink: &dyn ProgressSink,
    logger: &Logger,
    task: PullTask,
) {
    let PullTask {
        index,
        reference,
        cancel,
        signal,
        reports,
    } = task;

    let mut progress = ImageProgress::new(reference.as_str());
    sink.register(&progress);

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PullError::Cancelled),
        result = pull_and_track(engine, sink, &reference, &mut progress) => result,
    };

    if let Err(e) = &outcome {
        logger.error(&format!("{}: {}", reference, e));
        progress.fail(e.to_string());
    }
    progress.finish();
    sink.finish(&progress);

    // The receiver outlives the barrier wait, so this cannot fail in practice.
    let _ = reports.send(PullReport::from_progress(index, &progress, outcome));
    signal.done();
}

/// Open the pull stream and feed it through the decoder until it ends.
/// The stream is closed when this returns.
async fn pull_and_track<E: ImageEngine>(
    engine: &E,
    sink: &dyn ProgressSink,
    reference: &str,
    progress: &mut ImageProgress,
) -> std::result::Result<(), PullError> {
    let body = engine
        .pull_image(reference)
        .await
        .map_err(PullError::Start)?;

    let events = decode_events(body);
    tokio::pin!(events);

    while let Some(event) = events.next().await {
        let event = event?;
        let changed = progress.apply(&event);
        if let Some(error) = event.error {
            return Err(PullError::Engine(error));
        }
        if changed {
            sink.update(progress);
        }
    }
    Ok(())
}
