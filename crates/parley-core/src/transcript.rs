//! The in-memory conversation transcript.
//!
//! An ordered list of messages in the order they are sent to the remote
//! model. Each entry can be pinned; pinned entries survive every pruning
//! operation (`slice`, `shrink`, `auto_shrink`, `clear_unpinned`) and
//! refuse deletion.

use std::collections::BTreeSet;

use parley_types::error::TranscriptError;
use parley_types::message::Message;

use crate::slice_expr::SliceExpr;

/// A transcript entry: the message plus its pin flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub message: Message,
    pub pinned: bool,
}

/// Result of an automatic shrink: the begin index of the kept window and
/// how many messages were actually removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoShrink {
    pub begin: usize,
    pub removed: usize,
}

impl AutoShrink {
    /// The equivalent manual slice expression.
    pub fn expr(&self) -> SliceExpr {
        SliceExpr::from(self.begin)
    }
}

/// Ordered, pin-aware message list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    /// The messages in conversation order, as sent to the remote model.
    pub fn messages(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(Entry {
            message,
            pinned: false,
        });
    }

    /// Keep only `begin..end` plus every pinned entry outside that window.
    ///
    /// Pinned entries before the window stay before it and pinned entries
    /// after it stay after it, so the relative order never changes.
    /// Returns the number of entries removed.
    pub fn slice(&mut self, begin: usize, end: usize) -> usize {
        let end = end.min(self.entries.len());
        let begin = begin.min(end);
        let before = self.entries.len();

        let mut index = 0;
        self.entries.retain(|entry| {
            let keep = entry.pinned || (begin..end).contains(&index);
            index += 1;
            keep
        });

        before - self.entries.len()
    }

    /// Apply a slice expression. A no-op expression removes nothing.
    pub fn shrink(&mut self, expr: &SliceExpr) -> usize {
        match expr.resolve(self.entries.len()) {
            Some(window) => self.slice(window.start, window.end),
            None => 0,
        }
    }

    /// Halve the transcript after a context-length failure.
    ///
    /// - 0 or 1 entries: nothing to shrink.
    /// - 2 or 3 entries: keep only the last one.
    /// - otherwise keep the back half, from `len / 2`.
    ///
    /// Returns `None` when nothing was removed (including when every entry
    /// outside the kept window is pinned).
    pub fn auto_shrink(&mut self) -> Option<AutoShrink> {
        let len = self.entries.len();
        let begin = match len {
            0 | 1 => return None,
            2 | 3 => len - 1,
            _ => len / 2,
        };
        let removed = self.slice(begin, len);
        (removed > 0).then_some(AutoShrink { begin, removed })
    }

    /// Delete entries by index.
    ///
    /// Out-of-range indexes are skipped. If any in-range index is pinned the
    /// transcript is left untouched and an error is returned.
    pub fn delete(&mut self, indexes: &[usize]) -> Result<usize, TranscriptError> {
        let targets: BTreeSet<usize> = indexes
            .iter()
            .copied()
            .filter(|&i| i < self.entries.len())
            .collect();

        if let Some(&index) = targets.iter().find(|&&i| self.entries[i].pinned) {
            return Err(TranscriptError::Pinned { index });
        }

        let mut index = 0;
        self.entries.retain(|_| {
            let keep = !targets.contains(&index);
            index += 1;
            keep
        });
        Ok(targets.len())
    }

    /// Pin entries by index, skipping out-of-range ones.
    /// Returns how many entries changed state.
    pub fn pin(&mut self, indexes: &[usize]) -> usize {
        self.set_pinned(indexes, true)
    }

    /// Unpin entries by index, skipping out-of-range ones.
    pub fn unpin(&mut self, indexes: &[usize]) -> usize {
        self.set_pinned(indexes, false)
    }

    /// Drop every unpinned entry. Returns the number removed.
    pub fn clear_unpinned(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.pinned);
        before - self.entries.len()
    }

    /// Drop everything, pinned or not.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn set_pinned(&mut self, indexes: &[usize], pinned: bool) -> usize {
        let mut changed = 0;
        for &index in indexes {
            if let Some(entry) = self.entries.get_mut(index) {
                if entry.pinned != pinned {
                    entry.pinned = pinned;
                    changed += 1;
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(n: usize) -> Transcript {
        let mut t = Transcript::new();
        for i in 0..n {
            t.push(Message::user(format!("m{i}")));
        }
        t
    }

    fn contents(t: &Transcript) -> Vec<String> {
        t.entries().iter().map(|e| e.message.content.clone()).collect()
    }

    #[test]
    fn test_shrink_open_end() {
        let mut t = transcript(5);
        let removed = t.shrink(&"2:".parse().unwrap());
        assert_eq!(removed, 2);
        assert_eq!(contents(&t), vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_shrink_open_begin() {
        let mut t = transcript(5);
        t.shrink(&":3".parse().unwrap());
        assert_eq!(contents(&t), vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn test_shrink_begin_past_len_is_noop() {
        let mut t = transcript(5);
        assert_eq!(t.shrink(&"5:".parse().unwrap()), 0);
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn test_slice_keeps_pinned_outside_window_in_order() {
        let mut t = transcript(6);
        t.pin(&[0, 5]);
        t.slice(2, 4);
        assert_eq!(contents(&t), vec!["m0", "m2", "m3", "m5"]);
        assert!(t.get(0).unwrap().pinned);
        assert!(t.get(3).unwrap().pinned);
    }

    #[test]
    fn test_shrink_to_nothing_keeps_pinned() {
        let mut t = transcript(4);
        t.pin(&[1]);
        t.shrink(&"0:0".parse().unwrap());
        assert_eq!(contents(&t), vec!["m1"]);
    }

    #[test]
    fn test_delete_pinned_is_rejected_and_unchanged() {
        let mut t = transcript(4);
        t.pin(&[2]);
        let before = t.clone();
        let err = t.delete(&[1, 2]).unwrap_err();
        assert_eq!(err, TranscriptError::Pinned { index: 2 });
        assert_eq!(t, before);
    }

    #[test]
    fn test_delete_compacts_and_skips_out_of_range() {
        let mut t = transcript(4);
        let removed = t.delete(&[3, 0, 9, 0]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(contents(&t), vec!["m1", "m2"]);
    }

    #[test]
    fn test_unpin_allows_delete() {
        let mut t = transcript(2);
        t.pin(&[0]);
        assert!(t.delete(&[0]).is_err());
        assert_eq!(t.unpin(&[0, 7]), 1);
        assert_eq!(t.delete(&[0]).unwrap(), 1);
        assert_eq!(contents(&t), vec!["m1"]);
    }

    #[test]
    fn test_auto_shrink_small_transcripts() {
        assert_eq!(transcript(0).auto_shrink(), None);
        assert_eq!(transcript(1).auto_shrink(), None);

        let mut t = transcript(3);
        assert_eq!(t.auto_shrink(), Some(AutoShrink { begin: 2, removed: 2 }));
        assert_eq!(contents(&t), vec!["m2"]);

        let mut t = transcript(2);
        assert_eq!(t.auto_shrink().map(|s| s.removed), Some(1));
        assert_eq!(contents(&t), vec!["m1"]);
    }

    #[test]
    fn test_auto_shrink_keeps_back_half() {
        let mut t = transcript(5);
        let shrink = t.auto_shrink().unwrap();
        assert_eq!(shrink.begin, 2);
        assert_eq!(shrink.removed, 2);
        assert_eq!(contents(&t), vec!["m2", "m3", "m4"]);
        assert_eq!(shrink.expr().to_string(), "2:");
    }

    #[test]
    fn test_auto_shrink_converges_logarithmically() {
        for n in 2..200usize {
            let mut t = transcript(n);
            let bound = (n as f64).log2().ceil() as usize;
            let mut calls = 0;
            while t.len() > 1 {
                let before = t.len();
                assert!(t.auto_shrink().is_some());
                assert!(t.len() < before);
                calls += 1;
            }
            assert!(calls <= bound, "n={n} took {calls} calls, bound {bound}");
            assert_eq!(t.auto_shrink(), None);
        }
    }

    #[test]
    fn test_auto_shrink_with_only_pinned_left_reports_nothing() {
        let mut t = transcript(2);
        t.pin(&[0, 1]);
        assert_eq!(t.auto_shrink(), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_clear_unpinned() {
        let mut t = transcript(4);
        t.pin(&[1]);
        assert_eq!(t.clear_unpinned(), 3);
        assert_eq!(contents(&t), vec!["m1"]);
    }
}
