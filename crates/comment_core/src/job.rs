use crate::{Comment, CommentFilter, ContentId, RawPage};

/// Where a harvest job currently is in its pagination loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Fetching,
    Filtering,
    Deciding,
    Delaying,
    Done(DoneReason),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoneReason {
    /// Accumulated count reached the cap.
    CapReached,
    /// A page produced no usable comments.
    EmptyPage,
    /// Upstream reported cursor 0.
    Exhausted,
    /// The page request failed; no retry for this run.
    FetchFailed(String),
}

/// Terminal state of a job, as handed to the result sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEnd {
    Done(DoneReason),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    pub page: u32,
    pub kept: usize,
    pub accumulated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutcome {
    pub content_id: ContentId,
    pub comments: Vec<Comment>,
    pub pages: u32,
    pub end: TaskEnd,
}

/// Per-content-id pagination state.
///
/// The job never holds more than `cap` comments. It is pure: the caller
/// performs the request, the delay and the stop checks, and feeds results in.
#[derive(Debug, Clone)]
pub struct HarvestJob {
    content_id: ContentId,
    cap: usize,
    cursor: u64,
    page: u32,
    pages_fetched: u32,
    comments: Vec<Comment>,
    state: TaskState,
}

impl HarvestJob {
    pub fn new(content_id: ContentId, cap: usize) -> Self {
        let state = if cap == 0 {
            TaskState::Done(DoneReason::CapReached)
        } else {
            TaskState::Fetching
        };
        Self {
            content_id,
            cap,
            cursor: 0,
            page: 1,
            pages_fetched: 0,
            comments: Vec::new(),
            state,
        }
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Cursor for the next request; 0 for the first page.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// 1-based number of the page about to be requested.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn accumulated(&self) -> usize {
        self.comments.len()
    }

    pub fn remaining(&self) -> usize {
        self.cap.saturating_sub(self.comments.len())
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, TaskState::Done(_) | TaskState::Cancelled)
    }

    /// Feeds one fetched page through the filter and decides what comes next.
    ///
    /// Only valid while `Fetching`; in any other state the page is ignored.
    pub fn apply_page(&mut self, page: RawPage, filter: &dyn CommentFilter) -> PageReport {
        let page_no = self.page;
        if self.state != TaskState::Fetching {
            return PageReport {
                page: page_no,
                kept: 0,
                accumulated: self.accumulated(),
            };
        }
        self.pages_fetched += 1;

        self.state = TaskState::Filtering;
        let RawPage { items, next_cursor } = page;
        let mut batch = filter.filter(items, &self.content_id);

        self.state = TaskState::Deciding;
        if batch.is_empty() {
            self.state = TaskState::Done(DoneReason::EmptyPage);
            return PageReport {
                page: page_no,
                kept: 0,
                accumulated: self.accumulated(),
            };
        }

        batch.truncate(self.remaining());
        let kept = batch.len();
        self.comments.extend(batch);

        self.state = if next_cursor == 0 {
            TaskState::Done(DoneReason::Exhausted)
        } else if self.remaining() == 0 {
            TaskState::Done(DoneReason::CapReached)
        } else {
            self.cursor = next_cursor;
            self.page += 1;
            TaskState::Delaying
        };

        PageReport {
            page: page_no,
            kept,
            accumulated: self.accumulated(),
        }
    }

    /// Delay finished; request the next page.
    pub fn resume_fetching(&mut self) {
        if self.state == TaskState::Delaying {
            self.state = TaskState::Fetching;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.is_finished() {
            self.state = TaskState::Done(DoneReason::FetchFailed(message.into()));
        }
    }

    pub fn cancel(&mut self) {
        if !self.is_finished() {
            self.state = TaskState::Cancelled;
        }
    }

    /// Consumes the job. A job dropped before reaching a terminal state
    /// counts as cancelled; its comments are kept either way.
    pub fn finish(self) -> HarvestOutcome {
        let end = match self.state {
            TaskState::Done(reason) => TaskEnd::Done(reason),
            _ => TaskEnd::Cancelled,
        };
        HarvestOutcome {
            content_id: self.content_id,
            comments: self.comments,
            pages: self.pages_fetched,
            end,
        }
    }
}
