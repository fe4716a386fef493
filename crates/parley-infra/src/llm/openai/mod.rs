//! OpenAiClient -- [`CompletionClient`] for OpenAI-compatible chat
//! completion endpoints.
//!
//! Posts the [`Question`] to `{base_url}/chat/completions` with bearer
//! authentication. Blocking answers are parsed whole; streamed answers are
//! read by a background task that parses the event stream and hands chunks
//! over a bounded channel to the single consumer.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and only exposed
//! while building request headers. Requests can be routed through a SOCKS5
//! proxy; host names are then resolved by the proxy.

pub mod streaming;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tracing::debug;

use parley_core::llm::client::{ChunkStream, CompletionClient};
use parley_types::error::CompletionError;
use parley_types::llm::{Answer, AnswerChoice, AnswerChunk, Question};
use parley_types::message::Message;

use self::streaming::parse_sse;

/// Client for the OpenAI chat completion API.
///
/// Does not derive Debug so the key never ends up in logs.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    responses: Arc<Mutex<Vec<Answer>>>,
}

impl OpenAiClient {
    /// Create a client with a per-request `timeout`, optionally going
    /// through the SOCKS5 proxy at `socks5` (`host:port` or a full URL).
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        timeout: Duration,
        socks5: Option<&str>,
    ) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(addr) = socks5.map(str::trim).filter(|addr| !addr.is_empty()) {
            let url = proxy_url(addr);
            let proxy = reqwest::Proxy::all(&url)
                .map_err(|e| CompletionError::Http(format!("invalid socks5 proxy '{addr}': {e}")))?;
            debug!(proxy = %url, "using socks5 proxy");
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| CompletionError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            responses: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request(&self, question: &Question, stream: bool) -> reqwest::RequestBuilder {
        let mut body = question.clone();
        body.options.stream = stream;
        self.client
            .post(self.url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
    }
}

fn proxy_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("socks5h://{addr}")
    }
}

fn remember(responses: &Mutex<Vec<Answer>>, answer: Answer) {
    responses
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(answer);
}

/// Fold a streamed answer into the shape of a blocking one, for `:resp`.
fn combine(last: &AnswerChunk, content: String) -> Answer {
    let (finish_reason, index) = last
        .choices
        .first()
        .map(|c| (c.finish_reason.clone(), c.index))
        .unwrap_or_default();
    Answer {
        id: last.id.clone(),
        object: last.object.clone(),
        created: last.created,
        model: last.model.clone(),
        choices: vec![AnswerChoice {
            message: Message::assistant(content),
            finish_reason,
            index,
        }],
        ..Default::default()
    }
}

impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn ask(&self, question: &Question) -> Result<Answer, CompletionError> {
        let response = self
            .request(question, false)
            .send()
            .await
            .map_err(|e| CompletionError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Http(format!("failed to read response: {e}")))?;

        // Error statuses usually carry a JSON `error` object, which parses
        // into the answer and is reported from there.
        let answer: Answer = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                CompletionError::Deserialization(format!("failed to parse response: {e}"))
            } else {
                CompletionError::Status {
                    status: status.as_u16(),
                    body: body.clone(),
                }
            }
        })?;
        debug!(status = %status, choices = answer.choices.len(), "answer received");

        remember(&self.responses, answer.clone());
        Ok(answer)
    }

    fn stream(&self, question: Question) -> ChunkStream {
        let request = self.request(&question, true);
        let responses = Arc::clone(&self.responses);
        let (tx, mut rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx
                        .send(Err(CompletionError::Http(format!("HTTP request failed: {e}"))))
                        .await;
                    return;
                }
            };
            debug!(status = %response.status(), "stream opened");

            let chunks = parse_sse(response.bytes_stream());
            futures_util::pin_mut!(chunks);
            let mut content = String::new();
            let mut last: Option<AnswerChunk> = None;

            loop {
                let item = tokio::select! {
                    _ = tx.closed() => {
                        debug!("stream consumer went away");
                        return;
                    }
                    item = chunks.next() => item,
                };
                let Some(item) = item else { break };

                if let Ok(chunk) = &item {
                    if let Some(delta) = chunk.delta() {
                        content.push_str(delta);
                    }
                    if !chunk.choices.is_empty() {
                        last = Some(chunk.clone());
                    }
                }
                if tx.send(item).await.is_err() {
                    return;
                }
            }

            if let Some(last) = last {
                remember(&responses, combine(&last, content));
            }
        });

        Box::pin(async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        })
    }

    fn responses(&self) -> Vec<Answer> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::llm::{ChatOptions, ChunkChoice, Delta};

    fn make_client() -> OpenAiClient {
        OpenAiClient::new(
            SecretString::from("test-key-not-real"),
            "http://localhost:8080/v1/",
            Duration::from_secs(5),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_client_name() {
        assert_eq!(make_client().name(), "openai");
    }

    #[test]
    fn test_socks5_proxy() {
        assert_eq!(proxy_url("127.0.0.1:1080"), "socks5h://127.0.0.1:1080");
        assert_eq!(proxy_url("socks5://proxy:1080"), "socks5://proxy:1080");

        let key = || SecretString::from("test-key-not-real");
        let timeout = Duration::from_secs(5);
        assert!(OpenAiClient::new(key(), "http://localhost/v1", timeout, Some("127.0.0.1:1080")).is_ok());
        assert!(OpenAiClient::new(key(), "http://localhost/v1", timeout, Some("  ")).is_ok());
        assert!(OpenAiClient::new(key(), "http://localhost/v1", timeout, Some("bad host:port")).is_err());
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        assert_eq!(make_client().url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_forces_stream_flag_and_auth() {
        let client = make_client();
        let question = Question::new(ChatOptions::default(), vec![Message::user("hi")]);
        let request = client.request(&question, false).build().unwrap();

        let auth = request.headers().get("authorization").unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer test-key-not-real");

        let body: serde_json::Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_combine_streamed_answer() {
        let last = AnswerChunk {
            id: "chatcmpl-1".to_string(),
            model: "gpt-4".to_string(),
            choices: vec![ChunkChoice {
                delta: Delta::default(),
                finish_reason: Some("stop".to_string()),
                index: 0,
            }],
            ..Default::default()
        };
        let answer = combine(&last, "Hello".to_string());
        assert_eq!(answer.id, "chatcmpl-1");
        assert_eq!(answer.choices[0].message, Message::assistant("Hello"));
        assert_eq!(answer.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_responses_are_recorded() {
        let client = make_client();
        remember(&client.responses, Answer::default());
        assert_eq!(client.responses().len(), 1);
    }
}
