use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use comment_core::{ContentId, DoneReason, HarvestOutcome, TaskEnd};
use engine_logging::{engine_error, engine_info, engine_warn};
use tokio::task::JoinSet;

use crate::{HarvestEvent, HarvestTask, RunSummary, SinkHandle, TaskContext};

/// Worker count and per-content-id cap, adjustable while a run is going.
///
/// Worker changes apply at the next submission; cap changes apply to tasks
/// started afterwards.
#[derive(Debug)]
pub struct Tunables {
    workers: AtomicUsize,
    cap: AtomicUsize,
}

impl Tunables {
    pub fn new(workers: usize, cap: usize) -> Self {
        Self {
            workers: AtomicUsize::new(workers.max(1)),
            cap: AtomicUsize::new(cap),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.load(Ordering::Relaxed)
    }

    pub fn cap(&self) -> usize {
        self.cap.load(Ordering::Relaxed)
    }

    /// Zero is raised to one.
    pub fn set_workers(&self, workers: usize) -> usize {
        let workers = workers.max(1);
        self.workers.store(workers, Ordering::Relaxed);
        engine_info!("Worker limit set to {}", workers);
        workers
    }

    pub fn set_cap(&self, cap: usize) {
        self.cap.store(cap, Ordering::Relaxed);
        engine_info!("Per-content cap set to {}", cap);
    }
}

/// Runs at most `workers` harvest tasks at once and streams each finished
/// task into the sink as soon as it completes.
pub struct WorkerPool {
    ctx: Arc<TaskContext>,
    tunables: Arc<Tunables>,
}

impl WorkerPool {
    pub fn new(ctx: Arc<TaskContext>, tunables: Arc<Tunables>) -> Self {
        Self { ctx, tunables }
    }

    pub async fn run(&self, ids: Vec<ContentId>, sink: &SinkHandle) -> RunSummary {
        let mut summary = RunSummary {
            content_ids: ids.len(),
            ..RunSummary::default()
        };
        let mut pending = ids.into_iter();
        let mut running: JoinSet<HarvestOutcome> = JoinSet::new();
        let mut submitting = true;

        engine_info!(
            "Worker pool started: {} content ids, up to {} workers",
            summary.content_ids,
            self.tunables.workers()
        );

        loop {
            while submitting && running.len() < self.tunables.workers() {
                self.ctx.control.wait_while_paused().await;
                if self.ctx.control.should_stop() {
                    engine_info!("Stop signal seen; no further content ids are submitted");
                    submitting = false;
                    break;
                }
                let Some(content_id) = pending.next() else {
                    submitting = false;
                    break;
                };
                let ctx = self.ctx.clone();
                let task = HarvestTask::new(content_id, self.tunables.cap());
                running.spawn(async move { task.run(&ctx).await });
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            match joined {
                Ok(outcome) => self.complete(outcome, sink, &mut summary).await,
                Err(err) => {
                    engine_error!("Harvest task aborted: {}", err);
                    summary.failed += 1;
                }
            }
        }

        summary.not_started = pending.len();
        summary.stopped = self.ctx.control.should_stop();
        summary
    }

    async fn complete(&self, outcome: HarvestOutcome, sink: &SinkHandle, summary: &mut RunSummary) {
        match &outcome.end {
            TaskEnd::Done(DoneReason::FetchFailed(_)) => summary.failed += 1,
            TaskEnd::Done(_) => summary.completed += 1,
            TaskEnd::Cancelled => summary.cancelled += 1,
        }
        summary.comments_harvested += outcome.comments.len();

        let HarvestOutcome {
            content_id,
            comments,
            ..
        } = outcome;
        if comments.is_empty() {
            return;
        }

        match sink.write(comments).await {
            Ok(report) => {
                summary.comments_written += report.written;
                summary.duplicates_skipped += report.duplicates;
                engine_info!(
                    "[{}] stored {} new comments ({} already known)",
                    content_id,
                    report.written,
                    report.duplicates
                );
                self.ctx.progress.emit(HarvestEvent::BatchWritten {
                    content_id,
                    written: report.written,
                    duplicates: report.duplicates,
                });
            }
            Err(err) => {
                summary.write_errors += 1;
                engine_warn!("[{}] comments could not be stored: {}", content_id, err);
            }
        }
    }
}
