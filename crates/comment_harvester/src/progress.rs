use std::sync::atomic::{AtomicUsize, Ordering};

use comment_core::{DoneReason, TaskEnd};
use comment_engine::{HarvestEvent, ProgressSink};
use engine_logging::{engine_debug, engine_info};

/// Turns engine events into running totals in the log.
#[derive(Debug, Default)]
pub struct LogProgress {
    started: AtomicUsize,
    finished: AtomicUsize,
    stored: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::TaskStarted { .. } => {
                self.started.fetch_add(1, Ordering::Relaxed);
            }
            HarvestEvent::PageHarvested {
                content_id,
                page,
                accumulated,
                cap,
                ..
            } => engine_debug!("[{}] {}/{} after page {}", content_id, accumulated, cap, page),
            HarvestEvent::TaskFinished {
                content_id, end, ..
            } => {
                let finished = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
                let started = self.started.load(Ordering::Relaxed);
                engine_info!(
                    "[{}] {} ({} of {} started content ids done)",
                    content_id,
                    describe(&end),
                    finished,
                    started
                );
            }
            HarvestEvent::BatchWritten { written, .. } => {
                let stored = self.stored.fetch_add(written, Ordering::Relaxed) + written;
                engine_info!("{} new comments stored so far", stored);
            }
        }
    }
}

fn describe(end: &TaskEnd) -> String {
    match end {
        TaskEnd::Cancelled => "cancelled".to_string(),
        TaskEnd::Done(DoneReason::CapReached) => "cap reached".to_string(),
        TaskEnd::Done(DoneReason::EmptyPage) => "no more comments".to_string(),
        TaskEnd::Done(DoneReason::Exhausted) => "all pages read".to_string(),
        TaskEnd::Done(DoneReason::FetchFailed(reason)) => format!("failed: {reason}"),
    }
}
