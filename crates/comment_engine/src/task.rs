use std::sync::Arc;
use std::time::Duration;

use comment_core::{
    CommentFilter, ContentId, HarvestJob, HarvestOutcome, TaskEnd, TaskState, TopLevelFilter,
};
use engine_logging::{engine_debug, engine_info, engine_warn};
use rand::Rng;

use crate::{
    ControlSignal, HarvestEvent, PageFetcher, ProgressSink, RateLimiter, RateSettings,
    SilentProgress,
};

/// Longest uninterrupted sleep inside the inter-page delay.
pub const DELAY_STEP: Duration = Duration::from_millis(500);

/// Collaborators shared by every task of a run.
#[derive(Clone)]
pub struct TaskContext {
    pub fetcher: Arc<dyn PageFetcher>,
    pub limiter: Arc<RateLimiter>,
    pub control: ControlSignal,
    pub filter: Arc<dyn CommentFilter>,
    pub progress: Arc<dyn ProgressSink>,
}

impl TaskContext {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        limiter: Arc<RateLimiter>,
        control: ControlSignal,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            control,
            filter: Arc::new(TopLevelFilter),
            progress: Arc::new(SilentProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }
}

/// Drives one [`HarvestJob`] through requests, delays and stop checks.
pub struct HarvestTask {
    job: HarvestJob,
}

impl HarvestTask {
    pub fn new(content_id: ContentId, cap: usize) -> Self {
        Self {
            job: HarvestJob::new(content_id, cap),
        }
    }

    pub async fn run(mut self, ctx: &TaskContext) -> HarvestOutcome {
        let content_id = self.job.content_id().clone();
        let cap = self.job.cap();
        engine_info!("[{}] harvest started (cap {})", content_id, cap);
        ctx.progress.emit(HarvestEvent::TaskStarted {
            content_id: content_id.clone(),
            cap,
        });

        while !self.job.is_finished() {
            ctx.control.wait_while_paused().await;
            if ctx.control.should_stop() {
                engine_info!(
                    "[{}] stop signal seen before page {}",
                    content_id,
                    self.job.page()
                );
                self.job.cancel();
                break;
            }

            let acquired = tokio::select! {
                _ = ctx.limiter.acquire() => true,
                _ = ctx.control.stopped() => false,
            };
            if !acquired {
                self.job.cancel();
                break;
            }

            match ctx.fetcher.fetch(&content_id, self.job.cursor()).await {
                Ok(page) => {
                    let report = self.job.apply_page(page, ctx.filter.as_ref());
                    if report.kept > 0 {
                        engine_info!(
                            "[{}] page {}: kept {} (total {}/{})",
                            content_id,
                            report.page,
                            report.kept,
                            report.accumulated,
                            cap
                        );
                    } else {
                        engine_info!("[{}] page {}: no more comments", content_id, report.page);
                    }
                    ctx.progress.emit(HarvestEvent::PageHarvested {
                        content_id: content_id.clone(),
                        page: report.page,
                        kept: report.kept,
                        accumulated: report.accumulated,
                        cap,
                    });
                }
                Err(err) => {
                    engine_warn!("[{}] page {} failed: {}", content_id, self.job.page(), err);
                    self.job.fail(err.to_string());
                }
            }

            if *self.job.state() == TaskState::Delaying {
                let delay = draw_delay(&ctx.limiter.settings());
                engine_debug!(
                    "[{}] sleeping {:.2}s before next page",
                    content_id,
                    delay.as_secs_f64()
                );
                if ctx.control.sleep_stepped(delay, DELAY_STEP).await {
                    self.job.resume_fetching();
                } else {
                    engine_info!("[{}] stop signal during delay", content_id);
                    self.job.cancel();
                }
            }
        }

        let outcome = self.job.finish();
        match &outcome.end {
            TaskEnd::Cancelled => engine_info!(
                "[{}] cancelled with {} comments kept",
                content_id,
                outcome.comments.len()
            ),
            TaskEnd::Done(reason) => engine_info!(
                "[{}] finished with {} comments ({:?})",
                content_id,
                outcome.comments.len(),
                reason
            ),
        }
        ctx.progress.emit(HarvestEvent::TaskFinished {
            content_id,
            collected: outcome.comments.len(),
            end: outcome.end.clone(),
        });
        outcome
    }
}

/// Uniform draw from `[min_delay, max_delay]`.
pub fn draw_delay(settings: &RateSettings) -> Duration {
    let min = settings.min_delay.as_secs_f64();
    let max = settings.max_delay.as_secs_f64();
    if max <= min {
        return settings.min_delay;
    }
    Duration::from_secs_f64(rand::rng().random_range(min..=max))
}
