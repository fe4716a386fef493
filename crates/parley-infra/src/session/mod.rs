//! On-disk chat sessions.
//!
//! A [`Session`] owns the active transcript, the journal backing it, and
//! the stack of sessions stepped into with `:session stack push`. Every
//! session is one journal file named after its id in the session
//! directory. Opening an existing id replays its journal through the
//! message commands, so the rebuilt transcript matches the one that was
//! closed.
//!
//! Lifecycle: `open` (replaying if the id exists) -> mutations journaled
//! through [`TranscriptHost::record`] -> `close`, which deletes the file of
//! a session that recorded nothing. Opening another id while a session is
//! live only replaces it once the target has loaded, so a session that
//! fails to open leaves the current one untouched.

pub mod commands;

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parley_core::command::message::{replay_registry, replay_words};
use parley_core::host::TranscriptHost;
use parley_core::slice_expr::SliceExpr;
use parley_core::transcript::Transcript;
use parley_types::error::CommandError;
use parley_types::history::HistoryRecord;
use parley_types::message::Message;

use crate::history::{self, HistoryError, HistoryLog};

const ID_PREFIX: &str = "chat-";

/// Errors from session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("failed to {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("session \"{0}\" exist")]
    AlreadyExists(String),

    #[error("session \"{0}\" not found")]
    NotFound(String),

    #[error("session \"{0}\" is active, switch away before removing it")]
    Active(String),

    #[error("invalid session id \"{0}\": must be a plain file name")]
    InvalidId(String),

    #[error("no session is open")]
    Closed,

    #[error("failed to replay session \"{id}\" at record {index}: {source}")]
    Replay {
        id: String,
        index: usize,
        #[source]
        source: CommandError,
    },
}

impl From<SessionError> for CommandError {
    fn from(err: SessionError) -> Self {
        CommandError::Failed(err.to_string())
    }
}

/// Mint a fresh session id: `chat-<unix millis>-<uuid>`.
pub fn new_session_id() -> String {
    format!(
        "{ID_PREFIX}{}-{}",
        chrono::Utc::now().timestamp_millis(),
        Uuid::now_v7()
    )
}

/// Short form of a minted id (its last uuid group); other ids unchanged.
/// Short forms may collide; `:session list` shows full ids.
pub fn short_id(id: &str) -> &str {
    let minted = id.strip_prefix(ID_PREFIX).is_some_and(|rest| {
        rest.split_once('-')
            .is_some_and(|(millis, uuid)| millis.chars().all(|c| c.is_ascii_digit()) && Uuid::parse_str(uuid).is_ok())
    });
    if !minted {
        return id;
    }
    id.rsplit('-').next().unwrap_or(id)
}

/// Check that `id` names a file directly inside the session directory.
///
/// Rejects empty ids, `.` and `..`, absolute paths, and anything with a
/// path separator.
pub fn validate_id(id: &str) -> Result<(), SessionError> {
    let mut components = Path::new(id).components();
    let plain = matches!((components.next(), components.next()), (Some(Component::Normal(_)), None));
    if !plain || id.contains(['/', '\\']) {
        return Err(SessionError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Every session id in `dir`, sorted. Minted ids sort chronologically.
pub fn list_ids(dir: &Path) -> Result<Vec<String>, SessionError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SessionError::Io {
        operation: "read",
        path: dir.to_path_buf(),
        source,
    })?;

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SessionError::Io {
            operation: "read",
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_ok_and(|t| t.is_file()) {
            ids.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    ids.sort();
    Ok(ids)
}

/// The most recent session in `dir`, if any.
pub fn latest_id(dir: &Path) -> Result<Option<String>, SessionError> {
    Ok(list_ids(dir)?.pop())
}

/// The active session plus its stack.
#[derive(Debug)]
pub struct Session {
    dir: PathBuf,
    id: String,
    transcript: Transcript,
    history: Option<HistoryLog>,
    stack: Vec<String>,
}

impl Session {
    /// A closed session rooted at `dir`. Call [`Session::open`] next.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            id: String::new(),
            transcript: Transcript::new(),
            history: None,
            stack: Vec::new(),
        }
    }

    /// Open `id`, replaying its journal, or a freshly minted session when
    /// `id` is `None`.
    ///
    /// The target is loaded and replayed before anything changes: on error
    /// the current session stays open and journaled. On success the current
    /// session is closed and replaced. The journal is opened for appending
    /// after the existing content, and the first successful open seeds the
    /// stack with this session.
    pub fn open(&mut self, id: Option<&str>) -> Result<(), SessionError> {
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_session_id(),
        };
        if self.history.is_some() && id == self.id {
            return Ok(());
        }
        let path = self.path_of(&id)?;

        let records = history::load(&path)?;
        let transcript = replay(&id, &records)?;
        let log = HistoryLog::open(&path, records)?;
        info!(session_id = %id, records = log.len(), messages = transcript.len(), "session opened");

        if let Err(err) = self.close() {
            warn!(session_id = %self.id, error = %err, "failed to close session");
        }
        self.id = id;
        self.transcript = transcript;
        self.history = Some(log);
        if self.stack.is_empty() {
            self.stack.push(self.id.clone());
        }
        Ok(())
    }

    /// Close the journal. A session that recorded nothing is deleted.
    pub fn close(&mut self) -> Result<(), SessionError> {
        let Some(log) = self.history.take() else {
            return Ok(());
        };
        if !log.is_empty() {
            debug!(session_id = %self.id, records = log.len(), "session closed");
            return Ok(());
        }

        let path = log.path().to_path_buf();
        drop(log);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(session_id = %self.id, "empty session removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io {
                operation: "remove",
                path,
                source,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Journal path of `id`, after validating it.
    pub fn path_of(&self, id: &str) -> Result<PathBuf, SessionError> {
        validate_id(id)?;
        Ok(self.dir.join(id))
    }

    pub fn exists(&self, id: &str) -> Result<bool, SessionError> {
        Ok(self.path_of(id)?.is_file())
    }

    /// Records of the current session, loaded and written.
    pub fn history(&self) -> &[HistoryRecord] {
        self.history.as_ref().map_or(&[], |log| log.records())
    }

    /// Journal one mutation of the current session.
    pub fn append_record(&mut self, op: &str, message: Option<&Message>) -> Result<(), SessionError> {
        let log = self.history.as_mut().ok_or(SessionError::Closed)?;
        log.append(op, message)?;
        Ok(())
    }

    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    /// Step into `id` (or a new session) and push it onto the stack.
    pub fn push(&mut self, id: Option<&str>) -> Result<(), SessionError> {
        self.open(id)?;
        self.stack.push(self.id.clone());
        Ok(())
    }

    /// Leave the top session and return to the one below it. The bottom
    /// frame is never popped; returns whether anything changed. The stack
    /// is only popped once the session below has opened.
    pub fn pop(&mut self) -> Result<bool, SessionError> {
        let [.., below, _] = self.stack.as_slice() else {
            return Ok(false);
        };
        let below = below.clone();
        self.open(Some(&below))?;
        self.stack.pop();
        Ok(true)
    }

    /// Delete another session's journal.
    pub fn remove(&self, id: &str) -> Result<(), SessionError> {
        let path = self.path_of(id)?;
        if id == self.id {
            return Err(SessionError::Active(id.to_string()));
        }
        std::fs::remove_file(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SessionError::NotFound(id.to_string())
            } else {
                SessionError::Io {
                    operation: "remove",
                    path,
                    source,
                }
            }
        })?;
        info!(session_id = %id, "session removed");
        Ok(())
    }

    /// Keep the sessions inside the `expr` window of the sorted id list and
    /// delete the rest, never the active one. Returns the removed ids.
    pub fn shrink(&self, expr: &SliceExpr) -> Result<Vec<String>, SessionError> {
        let ids = list_ids(&self.dir)?;
        let Some(window) = expr.resolve(ids.len()) else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::new();
        for (i, id) in ids.into_iter().enumerate() {
            if window.contains(&i) || id == self.id {
                continue;
            }
            self.remove(&id)?;
            removed.push(id);
        }
        Ok(removed)
    }
}

impl TranscriptHost for Session {
    fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    fn record(&mut self, op: &str, message: Option<&Message>) {
        if let Err(err) = self.append_record(op, message) {
            error!(session_id = %self.id, op, error = %err, "failed to journal operation");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!(session_id = %self.id, error = %err, "failed to close session");
        }
    }
}

/// Rebuild a transcript by dispatching every record through the message
/// commands, exactly as a user would have typed them.
fn replay(id: &str, records: &[HistoryRecord]) -> Result<Transcript, SessionError> {
    let registry = replay_registry();
    let mut transcript = Transcript::new();
    for (index, record) in records.iter().enumerate() {
        replay_words(&record.op, record.msg.as_ref())
            .and_then(|words| registry.dispatch(&mut transcript, &words))
            .map_err(|source| SessionError::Replay {
                id: id.to_string(),
                index,
                source,
            })?;
    }
    if !records.is_empty() {
        debug!(session_id = %id, records = records.len(), "session replayed");
    }
    Ok(transcript)
}
