//! The seam between transcript mutations and the history journal.
//!
//! Anything that owns a [`Transcript`] and wants its mutations journaled
//! implements [`TranscriptHost`]. The command registry and the chat
//! orchestrator only ever mutate through a host, and call
//! [`TranscriptHost::record`] with the command line that reproduces the
//! mutation on replay.

use parley_types::message::Message;

use crate::transcript::Transcript;

/// Journal operation for appending a message; the message travels in the
/// record payload.
pub const APPEND_OP: &str = ":message append";

/// Owner of the active transcript.
pub trait TranscriptHost {
    fn transcript(&self) -> &Transcript;

    fn transcript_mut(&mut self) -> &mut Transcript;

    /// Journal a mutation that already happened.
    fn record(&mut self, op: &str, message: Option<&Message>);

    /// Append a message and journal it.
    fn push_message(&mut self, message: Message) {
        self.record(APPEND_OP, Some(&message));
        self.transcript_mut().push(message);
    }

    /// Append a message, pin it, and journal both steps.
    fn push_pinned(&mut self, message: Message) {
        self.push_message(message);
        let index = self.transcript().len() - 1;
        self.transcript_mut().pin(&[index]);
        self.record(&format!(":message pin {index}"), None);
    }

    /// Halve the transcript and journal the equivalent manual shrink.
    /// Returns the number of messages removed.
    fn auto_shrink(&mut self) -> usize {
        match self.transcript_mut().auto_shrink() {
            Some(shrink) => {
                self.record(&format!(":message shrink {}", shrink.expr()), None);
                shrink.removed
            }
            None => 0,
        }
    }

    /// Drop every unpinned message and journal it.
    fn reset(&mut self) -> usize {
        let removed = self.transcript_mut().clear_unpinned();
        if removed > 0 {
            self.record(":message reset", None);
        }
        removed
    }
}

/// A bare transcript journals nothing. Replay dispatches into one.
impl TranscriptHost for Transcript {
    fn transcript(&self) -> &Transcript {
        self
    }

    fn transcript_mut(&mut self) -> &mut Transcript {
        self
    }

    fn record(&mut self, _op: &str, _message: Option<&Message>) {}
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingHost;
    use super::*;

    #[test]
    fn test_push_message_records_payload() {
        let mut host = RecordingHost::default();
        host.push_message(Message::user("hi"));
        assert_eq!(host.transcript.len(), 1);
        assert_eq!(
            host.records,
            vec![(APPEND_OP.to_string(), Some(Message::user("hi")))]
        );
    }

    #[test]
    fn test_push_pinned_records_pin() {
        let mut host = RecordingHost::default();
        host.push_message(Message::user("a"));
        host.push_pinned(Message::system("b"));
        assert!(host.transcript.get(1).unwrap().pinned);
        assert_eq!(host.records.last().unwrap().0, ":message pin 1");
    }

    #[test]
    fn test_auto_shrink_records_equivalent_shrink() {
        let mut host = RecordingHost::default();
        for i in 0..5 {
            host.transcript.push(Message::user(format!("m{i}")));
        }
        assert_eq!(host.auto_shrink(), 2);
        assert_eq!(host.records, vec![(":message shrink 2:".to_string(), None)]);
    }

    #[test]
    fn test_reset_without_change_records_nothing() {
        let mut host = RecordingHost::default();
        assert_eq!(host.reset(), 0);
        assert!(host.records.is_empty());
    }
}
