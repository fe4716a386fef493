//! Configuration types for Parley.
//!
//! `ParleyConfig` is the `config.toml` stored in the data directory.
//! `Settings` is the live, interactively adjustable subset used on every
//! chat turn (`:set` / `:info`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::llm::ChatOptions;

/// How a completed answer is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Plain text, exactly as received.
    Text,
    /// Markdown rendered for the terminal.
    #[default]
    Markdown,
    /// JSON syntax highlighting.
    Json,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderMode::Text => "text",
            RenderMode::Markdown => "markdown",
            RenderMode::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(RenderMode::Text),
            "markdown" => Ok(RenderMode::Markdown),
            "json" => Ok(RenderMode::Json),
            other => Err(format!("invalid renderer '{other}', expected text, markdown or json")),
        }
    }
}

/// Top-level configuration file.
///
/// Loaded from `~/.parley/config.toml`. All fields have defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// API key for the completion endpoint.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// SOCKS5 proxy (`host:port`) for API requests.
    #[serde(default)]
    pub socks5: Option<String>,

    /// Optional system prompt added at the start of every new session.
    #[serde(default)]
    pub system: Option<String>,

    /// Command that each answer is piped into, after confirmation.
    #[serde(default)]
    pub executor: Option<String>,

    /// Send the executor's output back as the next question.
    #[serde(default)]
    pub feedback: bool,

    #[serde(default)]
    pub renderer: RenderMode,

    #[serde(default)]
    pub disable_auto_shrink: bool,

    #[serde(default)]
    pub non_interactive: bool,

    #[serde(default)]
    pub oneshot: bool,

    /// Model options sent with every request.
    #[serde(default)]
    pub chat: ChatOptions,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    180
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            socks5: None,
            system: None,
            executor: None,
            feedback: false,
            renderer: RenderMode::default(),
            disable_auto_shrink: false,
            non_interactive: false,
            oneshot: false,
            chat: ChatOptions::default(),
        }
    }
}

/// Options consulted on every chat turn and adjustable at runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub chat: ChatOptions,
    /// Fail instead of shrinking the transcript on a context-length error.
    pub disable_auto_shrink: bool,
    /// Evaluate the initial input and exit instead of entering the REPL.
    pub non_interactive: bool,
    /// Drop unpinned messages before every turn.
    pub oneshot: bool,
    pub verbose: bool,
    pub renderer: RenderMode,
    /// Command each answer is piped into, after confirmation.
    pub executor: Option<String>,
    /// Send the executor's output back as the next question.
    pub feedback: bool,
}

impl Settings {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            chat: config.chat.clone(),
            disable_auto_shrink: config.disable_auto_shrink,
            non_interactive: config.non_interactive,
            oneshot: config.oneshot,
            verbose: false,
            renderer: config.renderer,
            executor: config.executor.clone().filter(|cmd| !cmd.trim().is_empty()),
            feedback: config.feedback,
        }
    }
}
