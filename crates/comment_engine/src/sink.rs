use std::collections::HashSet;

use comment_core::Comment;
use engine_logging::{engine_debug, engine_error};
use tokio::sync::{mpsc, oneshot};

use crate::persist::StoreError;
use crate::CommentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub duplicates: usize,
}

/// Deduplicating front of a [`CommentStore`].
///
/// The dedup index is loaded once on open and only grows after a successful
/// append, so a failed write never hides ids from a later retry.
pub struct ResultSink<S: CommentStore> {
    store: S,
    known: HashSet<String>,
}

impl<S: CommentStore> ResultSink<S> {
    pub fn open(mut store: S) -> Result<Self, StoreError> {
        let known = store.load_known_ids()?;
        Ok(Self { store, known })
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn write(&mut self, comments: Vec<Comment>) -> Result<WriteReport, StoreError> {
        let total = comments.len();
        let mut batch_ids = HashSet::new();
        let fresh: Vec<Comment> = comments
            .into_iter()
            .filter(|comment| {
                !self.known.contains(&comment.comment_id)
                    && batch_ids.insert(comment.comment_id.clone())
            })
            .collect();

        self.store.append(&fresh)?;
        self.known.extend(batch_ids);

        let report = WriteReport {
            written: fresh.len(),
            duplicates: total - fresh.len(),
        };
        engine_debug!(
            "Sink wrote {} comments, skipped {} duplicates",
            report.written,
            report.duplicates
        );
        Ok(report)
    }

    /// Hands the sink to a background task that becomes the only writer of
    /// the store. Each batch is written on the blocking pool. The task exits
    /// once every handle is dropped.
    pub fn spawn(self) -> SinkHandle {
        let (tx, mut rx) = mpsc::channel::<SinkRequest>(32);
        tokio::spawn(async move {
            let mut sink = self;
            while let Some(SinkRequest { comments, reply }) = rx.recv().await {
                let joined = tokio::task::spawn_blocking(move || {
                    let result = sink.write(comments);
                    (sink, result)
                })
                .await;
                let (returned, result) = match joined {
                    Ok(done) => done,
                    Err(err) => {
                        engine_error!("Comment writer stopped: {}", err);
                        return;
                    }
                };
                sink = returned;
                if let Err(err) = &result {
                    engine_error!("Failed to persist comments: {}", err);
                }
                let _ = reply.send(result);
            }
        });
        SinkHandle { tx }
    }
}

struct SinkRequest {
    comments: Vec<Comment>,
    reply: oneshot::Sender<Result<WriteReport, StoreError>>,
}

/// Cheap handle to a spawned [`ResultSink`].
#[derive(Clone)]
pub struct SinkHandle {
    tx: mpsc::Sender<SinkRequest>,
}

impl SinkHandle {
    /// Returns once the batch is durable (or rejected).
    pub async fn write(&self, comments: Vec<Comment>) -> Result<WriteReport, StoreError> {
        if comments.is_empty() {
            return Ok(WriteReport::default());
        }
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SinkRequest { comments, reply })
            .await
            .map_err(|_| StoreError::SinkClosed)?;
        response.await.map_err(|_| StoreError::SinkClosed)?
    }
}
