use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use comment_core::ContentId;
use engine_logging::engine_info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("content id list {path:?} could not be read: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the run's content ids come from.
pub trait ContentIdSource: Send + Sync {
    fn read_ids(&self) -> Result<Vec<ContentId>, SourceError>;
}

impl ContentIdSource for Vec<ContentId> {
    fn read_ids(&self) -> Result<Vec<ContentId>, SourceError> {
        Ok(self.clone())
    }
}

/// Delimited text file with the content id in the first column.
#[derive(Debug, Clone)]
pub struct DelimitedIdFile {
    pub path: PathBuf,
    pub has_header: bool,
    pub delimiter: char,
}

impl DelimitedIdFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            has_header: true,
            delimiter: ',',
        }
    }

    pub fn without_header(mut self) -> Self {
        self.has_header = false;
        self
    }
}

impl ContentIdSource for DelimitedIdFile {
    fn read_ids(&self) -> Result<Vec<ContentId>, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        let ids = parse_id_column(&text, self.has_header, self.delimiter);
        engine_info!("Read {} content ids from {:?}", ids.len(), self.path);
        Ok(ids)
    }
}

/// First column of every row, blanks skipped, repeats collapsed to the first
/// occurrence. A quoted first cell may contain the delimiter and `""` escapes;
/// quoted line breaks are not supported.
pub fn parse_id_column(text: &str, has_header: bool, delimiter: char) -> Vec<ContentId> {
    let mut seen = HashSet::new();
    text.trim_start_matches('\u{feff}')
        .lines()
        .skip(usize::from(has_header))
        .filter_map(|row| {
            let cell = first_cell(row, delimiter);
            let cell = cell.trim();
            (!cell.is_empty()).then(|| cell.to_string())
        })
        .filter(|id| seen.insert(id.clone()))
        .map(ContentId::from)
        .collect()
}

fn first_cell(row: &str, delimiter: char) -> String {
    let row = row.trim_start();
    let Some(quoted) = row.strip_prefix('"') else {
        return row.split(delimiter).next().unwrap_or_default().to_string();
    };
    let mut cell = String::new();
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c != '"' {
            cell.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => cell.push('"'),
            _ => break,
        }
    }
    cell
}
