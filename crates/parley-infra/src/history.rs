//! Append-only JSONL journal of transcript mutations.
//!
//! Each [`HistoryRecord`] is written as one line and flushed before
//! `append` returns, so a crash never loses an acknowledged mutation and a
//! concurrent reader only ever sees whole lines.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use parley_types::history::HistoryRecord;
use parley_types::message::Message;

/// Errors from reading or writing a journal.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt history {} at line {line}: {source}", path.display())]
    JsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize history record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HistoryError {
    fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        HistoryError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read every record of the journal at `path`.
///
/// A missing file is an empty journal. Blank lines are skipped; any other
/// line that does not parse fails the whole load.
pub fn load(path: &Path) -> Result<Vec<HistoryRecord>, HistoryError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(HistoryError::io("read", path, err)),
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| HistoryError::JsonLine {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })
        })
        .collect()
}

/// An open journal: the append handle plus an in-memory mirror of every
/// record, loaded and written.
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
    file: File,
    offset: u64,
    records: Vec<HistoryRecord>,
}

impl HistoryLog {
    /// Open (or create) the journal for appending.
    ///
    /// `records` are the ones already on disk, as returned by [`load`]. The
    /// write cursor starts at the current end of the file.
    pub fn open(path: &Path, records: Vec<HistoryRecord>) -> Result<Self, HistoryError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| HistoryError::io("open", path, e))?;
        let offset = file
            .metadata()
            .map_err(|e| HistoryError::io("stat", path, e))?
            .len();
        debug!(path = %path.display(), offset, records = records.len(), "history opened");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            offset,
            records,
        })
    }

    /// Write one record and flush it.
    pub fn append(&mut self, op: &str, message: Option<&Message>) -> Result<&HistoryRecord, HistoryError> {
        let record = HistoryRecord {
            op: op.to_string(),
            msg: message.cloned(),
            offset: self.offset,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| HistoryError::io("write", &self.path, e))?;
        self.offset += line.len() as u64;

        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset the next record will be written at.
    #[cfg(test)]
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(load(&tmp.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_append_writes_one_line_per_record_with_offsets() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s");
        let mut log = HistoryLog::open(&path, Vec::new()).unwrap();
        log.append(":message append", Some(&Message::user("hi"))).unwrap();
        let first_len = log.offset();
        log.append(":message shrink 1:", None).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(log.records()[0].offset, 0);
        assert_eq!(log.records()[1].offset, first_len);
        assert_eq!(log.offset(), content.len() as u64);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, log.records());
    }

    #[test]
    fn test_reopen_continues_at_end() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s");
        {
            let mut log = HistoryLog::open(&path, Vec::new()).unwrap();
            log.append(":message reset", None).unwrap();
        }
        let records = load(&path).unwrap();
        let mut log = HistoryLog::open(&path, records).unwrap();
        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(log.offset(), size);
        log.append(":message reset", None).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(load(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_load_rejects_corrupt_line_with_line_number() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s");
        std::fs::write(
            &path,
            "{\"Op\":\":message reset\",\"Msg\":null,\"Offset\":0}\n\nnot json\n",
        )
        .unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, HistoryError::JsonLine { line: 3, .. }));
        assert!(err.to_string().contains("line 3"));
    }
}
