//! The durable history journal record.
//!
//! One record is written per transcript-mutating operation, one JSON object
//! per line: `{"Op": "...", "Msg": {"role": ..., "content": ...} | null,
//! "Offset": <byte offset of the line>}`.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// One journal entry: the operation as a command line, an optional message
/// payload, and the byte offset at which the line was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "Op")]
    pub op: String,
    #[serde(rename = "Msg")]
    pub msg: Option<Message>,
    #[serde(rename = "Offset")]
    pub offset: u64,
}
