//! CLI definitions for the `parley` binary.
//!
//! Running `parley` with no subcommand starts a chat: any start-up input
//! (`--system`, `--file`, `--stdin`, positional text) is evaluated as one
//! turn, then the REPL starts unless the run is non-interactive.

pub mod chat;
pub mod config;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use parley_types::config::{ParleyConfig, RenderMode};

/// Chat with an OpenAI-compatible model from the terminal.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub chat: ChatArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },

    /// Show or edit config.toml.
    Config(ConfigArgs),
}

/// Options of `parley config`.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Data directory (defaults to $PARLEY_DIR, then ~/.parley).
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Ask for the API key and proxy and store them.
    #[arg(long)]
    pub init: bool,

    /// Key to show or set, e.g. `timeout_secs` or `chat.model`.
    pub key: Option<String>,

    /// New value; "true" and "false" are stored as booleans, numbers as numbers.
    #[arg(allow_hyphen_values = true)]
    pub value: Option<String>,
}

/// Options of a chat run.
#[derive(Args, Debug, Default, Clone)]
pub struct ChatArgs {
    /// Data directory (defaults to $PARLEY_DIR, then ~/.parley).
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Open (and replay) this session instead of starting a new one.
    #[arg(long, short = 's')]
    pub session_id: Option<String>,

    /// Continue the most recent session.
    #[arg(long)]
    pub last: bool,

    /// System prompt added before the first turn.
    #[arg(long)]
    pub system: Option<String>,

    /// Pin the start-up messages so pruning keeps them.
    #[arg(long)]
    pub pin: bool,

    /// Send the content of a file ("-" reads stdin).
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Read the input from stdin; implies --non-interactive.
    #[arg(long)]
    pub stdin: bool,

    /// Send every question with only the pinned messages as context.
    #[arg(long)]
    pub oneshot: bool,

    /// Answer the start-up input and exit.
    #[arg(long, short = 'n')]
    pub non_interactive: bool,

    /// Fail instead of dropping old messages when the context is too long.
    #[arg(long)]
    pub disable_auto_shrink: bool,

    /// API key for the completion endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// SOCKS5 proxy for API requests, as host:port.
    #[arg(long)]
    pub socks5: Option<String>,

    /// How answers are printed: text, markdown or json.
    #[arg(long)]
    pub renderer: Option<RenderMode>,

    /// Pipe each answer into this command after confirmation. Only use it
    /// if you know the risk of running what the model returns.
    #[arg(long, short = 'e')]
    pub executor: Option<String>,

    /// Send the executor's output back as the next question.
    #[arg(long)]
    pub feedback: bool,

    /// Model to use.
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Sampling temperature, between 0 and 2.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling probability mass.
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Maximum number of tokens to generate.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Wait for the whole answer instead of streaming it.
    #[arg(long)]
    pub no_stream: bool,

    /// Text sent as the first question.
    pub text: Vec<String>,
}

impl ChatArgs {
    /// Overlay the flags that were given onto the loaded configuration.
    pub fn apply(&self, config: &mut ParleyConfig) {
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(system) = &self.system {
            config.system = Some(system.clone());
        }
        if let Some(socks5) = &self.socks5 {
            config.socks5 = Some(socks5.clone());
        }
        if let Some(renderer) = self.renderer {
            config.renderer = renderer;
        }
        if let Some(executor) = &self.executor {
            config.executor = Some(executor.clone());
        }
        config.feedback |= self.feedback;
        config.disable_auto_shrink |= self.disable_auto_shrink;
        config.non_interactive |= self.non_interactive;
        config.oneshot |= self.oneshot;

        let chat = &mut config.chat;
        if let Some(model) = &self.model {
            chat.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            chat.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            chat.top_p = top_p;
        }
        if self.max_tokens.is_some() {
            chat.max_tokens = self.max_tokens;
        }
        if self.no_stream {
            chat.stream = false;
        }
    }

    /// Whether the input comes from stdin (`--stdin` or `--file -`).
    pub fn reads_stdin(&self) -> bool {
        self.stdin || self.file.as_deref().is_some_and(|f| f.as_os_str() == "-")
    }
}
