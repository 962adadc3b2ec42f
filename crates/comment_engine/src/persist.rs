use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot create store directory {path}: {reason}")]
    StoreDir { path: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode comment: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("result sink is no longer running")]
    SinkClosed,
}

/// Creates the directory that will hold `file`. A bare file name needs nothing.
pub(crate) fn prepare_parent(file: &Path) -> Result<(), StoreError> {
    let Some(dir) = file.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        return Ok(());
    };
    let failed = |reason: String| StoreError::StoreDir {
        path: dir.display().to_string(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(failed("not a directory".to_string())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| failed(err.to_string()))
        }
        Err(err) => Err(failed(err.to_string())),
    }
}
