use std::fmt;

use comment_core::{ContentId, TaskEnd};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    TaskStarted {
        content_id: ContentId,
        cap: usize,
    },
    PageHarvested {
        content_id: ContentId,
        page: u32,
        kept: usize,
        accumulated: usize,
        cap: usize,
    },
    TaskFinished {
        content_id: ContentId,
        collected: usize,
        end: TaskEnd,
    },
    BatchWritten {
        content_id: ContentId,
        written: usize,
        duplicates: usize,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _event: HarvestEvent) {}
}

/// Totals for one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub content_ids: usize,
    /// Tasks that ended on cap, exhaustion or an empty page.
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Content ids never submitted because the run was stopped.
    pub not_started: usize,
    pub comments_harvested: usize,
    pub comments_written: usize,
    pub duplicates_skipped: usize,
    pub write_errors: usize,
    pub stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidHeader,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidHeader => write!(f, "invalid header"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
