//! BoxCompletionClient -- object-safe dynamic dispatch wrapper for
//! [`CompletionClient`].
//!
//! 1. `CompletionClientDyn` is the object-safe mirror with boxed futures.
//! 2. It is blanket-implemented for every `T: CompletionClient`.
//! 3. `BoxCompletionClient` wraps `Box<dyn CompletionClientDyn>` and delegates.

use std::future::Future;
use std::pin::Pin;

use parley_types::error::CompletionError;
use parley_types::llm::{Answer, Question};

use super::client::{ChunkStream, CompletionClient};

/// Object-safe version of [`CompletionClient`] with boxed futures.
pub trait CompletionClientDyn: Send + Sync {
    fn name(&self) -> &str;

    fn ask_boxed<'a>(
        &'a self,
        question: &'a Question,
    ) -> Pin<Box<dyn Future<Output = Result<Answer, CompletionError>> + Send + 'a>>;

    fn stream_boxed(&self, question: Question) -> ChunkStream;

    fn responses(&self) -> Vec<Answer>;
}

impl<T: CompletionClient> CompletionClientDyn for T {
    fn name(&self) -> &str {
        CompletionClient::name(self)
    }

    fn ask_boxed<'a>(
        &'a self,
        question: &'a Question,
    ) -> Pin<Box<dyn Future<Output = Result<Answer, CompletionError>> + Send + 'a>> {
        Box::pin(self.ask(question))
    }

    fn stream_boxed(&self, question: Question) -> ChunkStream {
        self.stream(question)
    }

    fn responses(&self) -> Vec<Answer> {
        CompletionClient::responses(self)
    }
}

/// Type-erased completion client.
///
/// `CompletionClient` uses RPITIT and cannot be a trait object directly;
/// this wrapper provides the same methods over `dyn CompletionClientDyn`.
pub struct BoxCompletionClient {
    inner: Box<dyn CompletionClientDyn + Send + Sync>,
}

impl BoxCompletionClient {
    pub fn new<T: CompletionClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn ask(&self, question: &Question) -> Result<Answer, CompletionError> {
        self.inner.ask_boxed(question).await
    }

    pub fn stream(&self, question: Question) -> ChunkStream {
        self.inner.stream_boxed(question)
    }

    pub fn responses(&self) -> Vec<Answer> {
        self.inner.responses()
    }
}
