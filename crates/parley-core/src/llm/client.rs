//! CompletionClient trait definition.
//!
//! Uses RPITIT for `ask`, and `Pin<Box<dyn Stream>>` for `stream` so the
//! trait stays usable behind [`super::box_client::BoxCompletionClient`].

use std::pin::Pin;

use futures_util::Stream;

use parley_types::error::CompletionError;
use parley_types::llm::{Answer, AnswerChunk, Question};

/// A lazy, finite, non-restartable sequence of answer chunks.
///
/// Terminates when the remote side sends its end marker or the connection
/// closes. Has exactly one consumer.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<AnswerChunk, CompletionError>> + Send + 'static>>;

/// Backend for the remote chat completion API.
pub trait CompletionClient: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Send the question and wait for the whole answer.
    ///
    /// An `error` object inside a well-formed body is returned as part of the
    /// `Answer`, not as an `Err`; transport and decode failures are `Err`.
    fn ask(
        &self,
        question: &Question,
    ) -> impl std::future::Future<Output = Result<Answer, CompletionError>> + Send;

    /// Send the question and receive the answer incrementally.
    fn stream(&self, question: Question) -> ChunkStream;

    /// Raw answers received so far in this process, oldest first.
    fn responses(&self) -> Vec<Answer> {
        Vec::new()
    }
}
