//! Comment harvester core: data model, page parsing, filtering and the pure
//! per-content-id pagination state machine.
mod command;
mod filter;
mod job;
mod model;
mod page;

pub use command::{parse_command, CommandError, ControlCommand};
pub use filter::{
    clean_html, normalize_timestamp, strip_source_prefix, CommentFilter, TopLevelFilter,
    SOURCE_PREFIX,
};
pub use job::{DoneReason, HarvestJob, HarvestOutcome, PageReport, TaskEnd, TaskState};
pub use model::{Comment, ContentId, Gender};
pub use page::{parse_page, RawComment, RawPage, RawUser};
