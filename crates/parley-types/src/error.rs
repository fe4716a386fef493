//! Error types shared across Parley layers.

/// Errors from the remote completion API.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),

    /// An `error` object returned by the remote side in a well-formed body.
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    #[error("context_length_exceeded: {message}")]
    ContextLengthExceeded { message: String },
}

impl CompletionError {
    /// Whether the transcript no longer fits the model's context window.
    pub fn is_context_length_exceeded(&self) -> bool {
        matches!(self, CompletionError::ContextLengthExceeded { .. })
    }
}

/// Errors from transcript editing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("message {index} is pinned, unpin it first")]
    Pinned { index: usize },

    #[error("invalid slice expression '{expr}': {reason}")]
    InvalidExpr { expr: String, reason: String },
}

/// Errors from dispatching a `:` command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    /// Rendered usage text of the rejected invocation.
    #[error("{0}")]
    Usage(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    /// A collaborator (session store, settings) rejected the operation.
    #[error("{0}")]
    Failed(String),
}

/// Errors from a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("{0}\n\nUse `:message shrink <expr>` to reduce the tokens")]
    AutoShrinkDisabled(CompletionError),
}
