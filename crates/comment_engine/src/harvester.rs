use std::sync::Arc;

use comment_core::ControlCommand;
use engine_logging::{engine_info, engine_warn};

use crate::{
    CommentStore, ContentIdSource, ControlSignal, PageFetcher, ProgressSink, RateLimiter,
    RateSettings, RateUpdate, ResultSink, RunSummary, SourceError, StoreError, TaskContext,
    Tunables, WorkerPool,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarvestSettings {
    pub rate: RateSettings,
    pub workers: usize,
    /// Maximum comments collected per content id in one run.
    pub cap: usize,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            rate: RateSettings::default(),
            workers: 3,
            cap: 100,
        }
    }
}

/// Entry point of a harvest run: wires limiter, control, pool and sink.
pub struct Harvester {
    ctx: TaskContext,
    tunables: Arc<Tunables>,
}

impl Harvester {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: HarvestSettings) -> Self {
        let limiter = Arc::new(RateLimiter::new(settings.rate));
        Self {
            ctx: TaskContext::new(fetcher, limiter, ControlSignal::new()),
            tunables: Arc::new(Tunables::new(settings.workers, settings.cap)),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.ctx = self.ctx.with_progress(progress);
        self
    }

    /// Handles for pausing, stopping and retuning the run from elsewhere.
    pub fn controls(&self) -> HarvestControls {
        HarvestControls {
            control: self.ctx.control.clone(),
            limiter: self.ctx.limiter.clone(),
            tunables: self.tunables.clone(),
        }
    }

    /// Harvests every content id of `source` into `store`.
    ///
    /// Only failing to read the id list or the existing store is an error;
    /// per-content-id failures end up in the summary.
    pub async fn run<S: CommentStore>(
        &self,
        source: &dyn ContentIdSource,
        store: S,
    ) -> Result<RunSummary, EngineError> {
        let ids = source.read_ids()?;
        if ids.is_empty() {
            engine_warn!("No content ids to harvest");
            return Ok(RunSummary::default());
        }

        let sink = ResultSink::open(store)?;
        engine_info!("Dedup index holds {} known comment ids", sink.known_count());
        let sink = sink.spawn();

        let pool = WorkerPool::new(Arc::new(self.ctx.clone()), self.tunables.clone());
        let summary = pool.run(ids, &sink).await;

        engine_info!(
            "Harvest finished: {} new comments written ({} harvested, {} duplicates, {} completed, {} failed, {} cancelled, {} not started)",
            summary.comments_written,
            summary.comments_harvested,
            summary.duplicates_skipped,
            summary.completed,
            summary.failed,
            summary.cancelled,
            summary.not_started
        );
        Ok(summary)
    }
}

/// Controller side of a run. Cheap to clone; usable from any thread.
#[derive(Debug, Clone)]
pub struct HarvestControls {
    pub control: ControlSignal,
    pub limiter: Arc<RateLimiter>,
    pub tunables: Arc<Tunables>,
}

impl HarvestControls {
    pub fn apply(&self, command: ControlCommand) {
        match command {
            ControlCommand::Pause => self.control.pause(),
            ControlCommand::Resume => self.control.resume(),
            ControlCommand::Stop => self.control.stop(),
            ControlCommand::Status => engine_info!("{}", self.status()),
            ControlCommand::Rate(rpm) => {
                self.limiter.configure(RateUpdate {
                    requests_per_minute: Some(rpm),
                    ..RateUpdate::default()
                });
            }
            ControlCommand::Delay { min_secs, max_secs } => {
                self.limiter.configure(RateUpdate {
                    min_delay_secs: Some(min_secs),
                    max_delay_secs: Some(max_secs),
                    ..RateUpdate::default()
                });
            }
            ControlCommand::Workers(workers) => {
                self.tunables.set_workers(workers);
            }
            ControlCommand::Cap(cap) => self.tunables.set_cap(cap),
        }
    }

    pub fn status(&self) -> String {
        let rate = self.limiter.settings();
        let state = if self.control.should_stop() {
            "stopping"
        } else if self.control.should_pause() {
            "paused"
        } else {
            "running"
        };
        format!(
            "{state}: rpm={} delay={:.1}s..{:.1}s workers={} cap={}",
            rate.requests_per_minute,
            rate.min_delay.as_secs_f64(),
            rate.max_delay.as_secs_f64(),
            self.tunables.workers(),
            self.tunables.cap()
        )
    }
}
