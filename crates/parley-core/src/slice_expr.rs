//! The `begin:end` slice expression grammar.
//!
//! Used by `:message shrink` (over transcript indexes) and `:session shrink`
//! (over the sorted list of session ids). The expression names the window
//! to KEEP:
//!
//! | expr   | window          |
//! |--------|-----------------|
//! | `2:`   | `2..len`        |
//! | `:3`   | `0..3`          |
//! | `2:4`  | `2..4`          |
//! | `2`    | `2..len`        |
//! | `0:0`  | empty           |
//!
//! `end` is clamped to the length; a `begin` at or past the length makes the
//! whole operation a no-op.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use parley_types::error::TranscriptError;

/// A parsed `begin:end` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceExpr {
    begin: usize,
    /// `None` means "to the end".
    end: Option<usize>,
}

impl SliceExpr {
    /// Keep everything from `begin` to the end.
    pub fn from(begin: usize) -> Self {
        Self { begin, end: None }
    }

    /// The window to keep for a sequence of `len` items.
    ///
    /// Returns `None` when `begin >= len`, meaning nothing should change.
    pub fn resolve(&self, len: usize) -> Option<Range<usize>> {
        if self.begin >= len {
            return None;
        }
        let end = self.end.map_or(len, |end| end.min(len));
        Some(self.begin..end)
    }
}

impl FromStr for SliceExpr {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| TranscriptError::InvalidExpr {
            expr: s.to_string(),
            reason,
        };
        let bound = |part: &str| -> Result<Option<usize>, TranscriptError> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<usize>()
                .map(Some)
                .map_err(|e| invalid(format!("'{part}' is not an index: {e}")))
        };

        let expr = match s.split_once(':') {
            None => Self {
                begin: bound(s)?.unwrap_or(0),
                end: None,
            },
            Some((begin, end)) => Self {
                begin: bound(begin)?.unwrap_or(0),
                end: bound(end)?,
            },
        };

        if let Some(end) = expr.end {
            if end < expr.begin {
                return Err(invalid(format!("end {end} is before begin {}", expr.begin)));
            }
        }
        Ok(expr)
    }
}

impl fmt::Display for SliceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{end}", self.begin),
            None => write!(f, "{}:", self.begin),
        }
    }
}
