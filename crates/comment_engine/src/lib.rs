//! Comment harvester engine: rate-limited fetching, worker pool and
//! deduplicating persistence.
mod control;
mod fetch;
mod harvester;
mod persist;
mod pool;
mod rate;
mod sink;
mod source;
mod store;
mod task;
mod types;

pub use control::{ControlSignal, PAUSE_POLL_INTERVAL};
pub use fetch::{FetchSettings, PageFetcher, ReqwestPageFetcher, DEFAULT_ENDPOINT};
pub use harvester::{EngineError, HarvestControls, HarvestSettings, Harvester};
pub use persist::StoreError;
pub use pool::{Tunables, WorkerPool};
pub use rate::{delay_from_secs, RateLimiter, RateSettings, RateUpdate, MAX_DELAY};
pub use sink::{ResultSink, SinkHandle, WriteReport};
pub use source::{parse_id_column, ContentIdSource, DelimitedIdFile, SourceError};
pub use store::{CommentStore, JsonlCommentStore, MemoryCommentStore};
pub use task::{draw_delay, HarvestTask, TaskContext, DELAY_STEP};
pub use types::{
    FailureKind, FetchError, HarvestEvent, ProgressSink, RunSummary, SilentProgress,
};
