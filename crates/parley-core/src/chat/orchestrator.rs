//! One chat turn against the completion client.
//!
//! A turn sends the whole transcript, commits the assistant reply on
//! success, and on a context-length failure halves the transcript and
//! tries again until the request fits or nothing more can be removed.
//! Cancellation aborts the in-flight request without committing anything.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_types::config::Settings;
use parley_types::error::{ChatError, CompletionError};
use parley_types::llm::{AnswerUsage, Question};
use parley_types::message::Message;

use crate::host::TranscriptHost;
use crate::llm::box_client::BoxCompletionClient;
use crate::llm::client::ChunkStream;

/// Progress notifications emitted while a turn runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEvent<'a> {
    /// A request is about to be sent; `attempt` starts at 1.
    Request { attempt: usize },
    /// Streamed answer text.
    Delta(&'a str),
    /// The transcript was shrunk after a context-length failure.
    Shrunk { removed: usize },
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The transcript was empty; nothing was sent.
    Idle,
    /// The reply was appended to the transcript.
    Completed {
        content: String,
        /// Token usage, reported by blocking answers only.
        usage: Option<AnswerUsage>,
    },
    /// Cancelled before the answer ended. Nothing was committed.
    Cancelled { partial: String },
}

enum Attempt {
    /// The answer ended; `replies` are committed in order.
    Done {
        content: String,
        usage: Option<AnswerUsage>,
        replies: Vec<Message>,
    },
    Cancelled(String),
}

/// Drives chat turns over a [`BoxCompletionClient`].
pub struct ChatOrchestrator {
    client: BoxCompletionClient,
}

impl ChatOrchestrator {
    pub fn new(client: BoxCompletionClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &BoxCompletionClient {
        &self.client
    }

    /// Run one turn.
    ///
    /// In oneshot mode unpinned messages are dropped first. Non-empty
    /// `input` is appended as a user message. If the transcript is then
    /// empty the turn is [`TurnOutcome::Idle`].
    pub async fn talk<H, F>(
        &self,
        host: &mut H,
        settings: &Settings,
        input: &str,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<TurnOutcome, ChatError>
    where
        H: TranscriptHost,
        F: FnMut(ChatEvent<'_>),
    {
        if settings.oneshot {
            host.reset();
        }
        if !input.trim().is_empty() {
            host.push_message(Message::user(input));
        }
        if host.transcript().is_empty() {
            return Ok(TurnOutcome::Idle);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            on_event(ChatEvent::Request { attempt });
            let question = Question::new(settings.chat.clone(), host.transcript().messages());
            debug!(
                attempt,
                messages = question.messages.len(),
                stream = settings.chat.stream,
                "sending question"
            );

            let result = if settings.chat.stream {
                self.stream_attempt(question, cancel, &mut on_event).await
            } else {
                self.ask_attempt(question, cancel).await
            };

            match result {
                Ok(Attempt::Done {
                    content,
                    usage,
                    replies,
                }) => {
                    for reply in replies {
                        host.push_message(reply);
                    }
                    return Ok(TurnOutcome::Completed { content, usage });
                }
                Ok(Attempt::Cancelled(partial)) => {
                    info!(received = partial.len(), "chat turn cancelled");
                    return Ok(TurnOutcome::Cancelled { partial });
                }
                Err(error) => recover(host, settings, error, &mut on_event)?,
            }
        }
    }

    async fn stream_attempt<F>(
        &self,
        question: Question,
        cancel: &CancellationToken,
        on_event: &mut F,
    ) -> Result<Attempt, CompletionError>
    where
        F: FnMut(ChatEvent<'_>),
    {
        collect_stream(self.client.stream(question), cancel, on_event).await
    }

    async fn ask_attempt(&self, question: Question, cancel: &CancellationToken) -> Result<Attempt, CompletionError> {
        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Attempt::Cancelled(String::new())),
            answer = self.client.ask(&question) => answer?,
        };

        if let Some(error) = answer.api_error() {
            return Err(error.clone().into_error());
        }

        let replies: Vec<Message> = answer.choices.into_iter().map(|c| c.message).collect();
        let content = replies
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Attempt::Done {
            content,
            usage: Some(answer.usage),
            replies,
        })
    }
}

async fn collect_stream<F>(
    mut chunks: ChunkStream,
    cancel: &CancellationToken,
    on_event: &mut F,
) -> Result<Attempt, CompletionError>
where
    F: FnMut(ChatEvent<'_>),
{
    let mut content = String::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Attempt::Cancelled(content)),
            next = chunks.next() => next,
        };

        match next {
            None => {
                let replies = vec![Message::assistant(content.clone())];
                return Ok(Attempt::Done {
                    content,
                    usage: None,
                    replies,
                });
            }
            Some(Err(e)) => return Err(e),
            Some(Ok(chunk)) => {
                if let Some(error) = chunk.api_error() {
                    return Err(error.clone().into_error());
                }
                if let Some(delta) = chunk.delta() {
                    content.push_str(delta);
                    on_event(ChatEvent::Delta(delta));
                }
            }
        }
    }
}

/// Decide whether a failed attempt may be retried. Shrinks the transcript
/// on a context-length failure and returns `Ok` when a retry should follow.
fn recover<H, F>(
    host: &mut H,
    settings: &Settings,
    error: CompletionError,
    on_event: &mut F,
) -> Result<(), ChatError>
where
    H: TranscriptHost,
    F: FnMut(ChatEvent<'_>),
{
    if !error.is_context_length_exceeded() {
        return Err(error.into());
    }
    if settings.disable_auto_shrink {
        return Err(ChatError::AutoShrinkDisabled(error));
    }

    let removed = host.auto_shrink();
    if removed == 0 {
        warn!(messages = host.transcript().len(), "context length exceeded and nothing left to shrink");
        return Err(error.into());
    }
    info!(removed, remaining = host.transcript().len(), "transcript shrunk after context length error");
    on_event(ChatEvent::Shrunk { removed });
    Ok(())
}
