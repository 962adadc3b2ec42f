use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use comment_core::Comment;
use engine_logging::{engine_info, engine_warn};
use serde::Deserialize;

use crate::persist::{prepare_parent, StoreError};

/// Durable home of harvested comments.
///
/// Only ever driven from the single sink writer, so implementations need no
/// locking of their own.
pub trait CommentStore: Send + 'static {
    /// Every comment id already persisted.
    fn load_known_ids(&mut self) -> Result<HashSet<String>, StoreError>;
    /// Appends a batch in one piece.
    fn append(&mut self, batch: &[Comment]) -> Result<(), StoreError>;
}

#[derive(Deserialize)]
struct StoredKey {
    #[serde(rename = "commentId")]
    comment_id: String,
}

/// One JSON object per line, append-only.
#[derive(Debug, Clone)]
pub struct JsonlCommentStore {
    path: PathBuf,
}

impl JsonlCommentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads back every well-formed record, in file order.
    pub fn read_all(&self) -> Result<Vec<Comment>, StoreError> {
        let Some(reader) = self.open_reader()? else {
            return Ok(Vec::new());
        };
        let mut comments = Vec::new();
        for_each_line(reader, |line| {
            if let Ok(comment) = serde_json::from_slice::<Comment>(line) {
                comments.push(comment);
            }
        })?;
        Ok(comments)
    }

    fn open_reader(&self) -> Result<Option<BufReader<File>>, StoreError> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(BufReader::new(file))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl CommentStore for JsonlCommentStore {
    fn load_known_ids(&mut self) -> Result<HashSet<String>, StoreError> {
        let Some(reader) = self.open_reader()? else {
            engine_info!("No existing store at {:?}; starting empty", self.path);
            return Ok(HashSet::new());
        };

        let mut known = HashSet::new();
        let mut malformed = 0usize;
        for_each_line(reader, |line| match serde_json::from_slice::<StoredKey>(line) {
            Ok(key) => {
                known.insert(key.comment_id);
            }
            Err(_) => malformed += 1,
        })?;
        if malformed > 0 {
            engine_warn!("Skipped {} malformed lines in {:?}", malformed, self.path);
        }
        engine_info!("Loaded {} known comment ids from {:?}", known.len(), self.path);
        Ok(known)
    }

    fn append(&mut self, batch: &[Comment]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        prepare_parent(&self.path)?;

        let mut buffer = Vec::new();
        for comment in batch {
            serde_json::to_writer(&mut buffer, comment)?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let start = file.metadata()?.len();
        // A torn tail from an earlier failed append must not swallow the
        // first record of this batch.
        if start > 0 && !ends_with_newline(&mut file, start)? {
            buffer.insert(0, b'\n');
        }

        let written = file
            .write_all(&buffer)
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_data());
        if let Err(err) = written {
            if let Err(undo) = file.set_len(start) {
                engine_warn!("Could not roll back partial write to {:?}: {}", self.path, undo);
            }
            return Err(err.into());
        }
        Ok(())
    }
}

/// Calls `visit` with every non-blank line as raw bytes. Invalid UTF-8 is
/// left for the JSON decoder to reject.
fn for_each_line(
    mut reader: BufReader<File>,
    mut visit: impl FnMut(&[u8]),
) -> Result<(), StoreError> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        visit(&line);
    }
}

fn ends_with_newline(file: &mut File, len: u64) -> Result<bool, StoreError> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// In-memory store; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryCommentStore {
    records: Arc<Mutex<Vec<Comment>>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Comment>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    pub fn records(&self) -> Vec<Comment> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommentStore for MemoryCommentStore {
    fn load_known_ids(&mut self) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .records()
            .into_iter()
            .map(|comment| comment.comment_id)
            .collect())
    }

    fn append(&mut self, batch: &[Comment]) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(batch);
        Ok(())
    }
}
