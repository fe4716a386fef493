//! Completion API request/response types.
//!
//! These model the wire shapes of an OpenAI-compatible chat completion
//! endpoint: the `Question` sent, the blocking `Answer`, and the incremental
//! `AnswerChunk`s of a streamed answer. Every response shape carries an
//! optional `error` object that the remote side fills instead of (or in
//! addition to) a transport-level failure.

use serde::{Deserialize, Serialize};

use crate::error::CompletionError;
use crate::message::{Message, Role};

/// Remote error code signalling that the prompt no longer fits the model.
pub const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";

/// Model options passed through verbatim on every request.
///
/// Optional fields are omitted from the request body when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    /// ID of the model to use.
    pub model: String,
    /// Sampling temperature, between 0 and 2.
    pub temperature: f32,
    /// Nucleus sampling probability mass.
    pub top_p: f32,
    /// How many choices to generate for each request.
    pub n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    /// Deliver the answer incrementally as server-sent events.
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// End-user identifier forwarded to the remote API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 1.0,
            top_p: 1.0,
            n: 1,
            stop: None,
            stream: true,
            max_tokens: None,
            presence_penalty: None,
            frequency_penalty: None,
            user: None,
        }
    }
}

/// Request body: the options flattened next to the full transcript.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    #[serde(flatten)]
    pub options: ChatOptions,
    pub messages: Vec<Message>,
}

impl Question {
    pub fn new(options: ChatOptions, messages: Vec<Message>) -> Self {
        Self { options, messages }
    }
}

/// Error object embedded in an otherwise well-formed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Usually a string, but some compatible servers send numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl ApiError {
    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }

    /// The error code rendered as text, if present.
    pub fn code_text(&self) -> Option<String> {
        match &self.code {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Convert into the typed error, recognizing the context-length code.
    pub fn into_error(self) -> CompletionError {
        let code = self.code_text();
        let exceeded = code.as_deref() == Some(CONTEXT_LENGTH_EXCEEDED)
            || self.message.contains(CONTEXT_LENGTH_EXCEEDED);
        if exceeded {
            CompletionError::ContextLengthExceeded {
                message: self.message,
            }
        } else {
            CompletionError::Api {
                code: code.unwrap_or(self.kind),
                message: self.message,
            }
        }
    }
}

/// Token usage reported for a blocking answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One choice of a blocking answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerChoice {
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
}

/// Blocking (non-streamed) response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Answer {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub usage: AnswerUsage,
    pub choices: Vec<AnswerChoice>,
    #[serde(skip_serializing_if = "ApiError::is_empty")]
    pub error: ApiError,
}

impl Answer {
    /// The embedded remote error, if the answer carries one.
    pub fn api_error(&self) -> Option<&ApiError> {
        (!self.error.is_empty()).then_some(&self.error)
    }
}

/// Incremental content of one streamed choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One choice of a streamed chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkChoice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
    pub index: u32,
}

/// One event of a streamed answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "ApiError::is_empty")]
    pub error: ApiError,
}

impl AnswerChunk {
    /// Text carried by the first choice, if any.
    pub fn delta(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }

    /// The embedded remote error, if the chunk carries one.
    pub fn api_error(&self) -> Option<&ApiError> {
        (!self.error.is_empty()).then_some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_options_defaults() {
        let opts = ChatOptions::default();
        assert_eq!(opts.model, "gpt-3.5-turbo");
        assert!((opts.temperature - 1.0).abs() < f32::EPSILON);
        assert!((opts.top_p - 1.0).abs() < f32::EPSILON);
        assert_eq!(opts.n, 1);
        assert!(opts.stream);
        assert!(opts.max_tokens.is_none());
    }

    #[test]
    fn test_question_body_omits_unset_options() {
        let question = Question::new(ChatOptions::default(), vec![Message::user("hi")]);
        let value = serde_json::to_value(&question).unwrap();
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["n"], 1);
        assert_eq!(value["stream"], true);
        assert!(value.get("max_tokens").is_none());
        assert!(value.get("user").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_answer_parses_usage_and_choices() {
        let json = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1680000000,
            "model": "gpt-3.5-turbo",
            "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21},
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop", "index": 0}]
        }"#;
        let answer: Answer = serde_json::from_str(json).unwrap();
        assert_eq!(answer.usage.total_tokens, 21);
        assert_eq!(answer.choices.len(), 1);
        assert_eq!(answer.choices[0].message.content, "Hello!");
        assert!(answer.error.is_empty());
    }

    #[test]
    fn test_answer_with_error_only() {
        let json = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key", "param": null}}"#;
        let answer: Answer = serde_json::from_str(json).unwrap();
        assert!(answer.choices.is_empty());
        assert_eq!(answer.error.code_text().as_deref(), Some("invalid_api_key"));
        let err = answer.error.into_error();
        assert!(!err.is_context_length_exceeded());
        assert!(err.to_string().contains("Incorrect API key"));
    }

    #[test]
    fn test_context_length_code_is_recognized() {
        let error = ApiError {
            message: "This model's maximum context length is 4097 tokens.".to_string(),
            kind: "invalid_request_error".to_string(),
            code: Some(serde_json::Value::String(CONTEXT_LENGTH_EXCEEDED.to_string())),
            param: Some("messages".to_string()),
        };
        assert!(error.into_error().is_context_length_exceeded());
    }

    #[test]
    fn test_chunk_delta_and_error() {
        let json = r#"{"id":"c1","choices":[{"delta":{"content":"Hel"},"index":0,"finish_reason":null}]}"#;
        let chunk: AnswerChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.delta(), Some("Hel"));
        assert!(chunk.api_error().is_none());

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#;
        let chunk: AnswerChunk = serde_json::from_str(role_only).unwrap();
        assert_eq!(chunk.delta(), None);
    }
}
