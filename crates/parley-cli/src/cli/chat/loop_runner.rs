//! Main chat loop.
//!
//! Resolves the data directory and configuration, opens the session,
//! feeds the start-up input through one turn, then runs the REPL until
//! `:exit` or Ctrl+D. With an executor configured, every answer can be
//! piped into that command after confirmation, and its output optionally
//! fed back as the next question.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_core::chat::{ChatEvent, ChatOrchestrator, TurnOutcome};
use parley_core::command::CommandRegistry;
use parley_core::command::message::plural;
use parley_core::host::TranscriptHost;
use parley_core::llm::box_client::BoxCompletionClient;
use parley_infra::config::load_config;
use parley_infra::filesystem::{DataDirs, resolve_data_dir};
use parley_infra::llm::openai::OpenAiClient;
use parley_infra::session::{Session, latest_id};
use parley_infra::shell::{run_command, run_with_input};
use parley_types::config::Settings;
use parley_types::error::ChatError;
use parley_types::message::Message;

use super::banner::print_welcome_banner;
use super::commands::{build_registry, is_command, mask_secret};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;
use super::state::ChatState;
use crate::cli::ChatArgs;

/// Run a chat with the given options.
pub async fn run_chat(args: ChatArgs, verbose: bool) -> Result<()> {
    let dirs = DataDirs::new(resolve_data_dir(args.dir.as_deref()));
    dirs.create()
        .with_context(|| format!("failed to create data directory {}", dirs.root().display()))?;

    let mut config = load_config(&dirs.config_path()).await;
    args.apply(&mut config);

    let api_key = config
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .context("no API key: pass --api-key, set OPENAI_API_KEY, or add api_key to config.toml")?;
    let client = OpenAiClient::new(
        SecretString::from(api_key.clone()),
        &config.base_url,
        Duration::from_secs(config.timeout_secs),
        config.socks5.as_deref(),
    )?;

    let session_dir = dirs.session_dir();
    let session_id = match &args.session_id {
        Some(id) => Some(id.clone()),
        None if args.last => latest_id(&session_dir)?,
        None => None,
    };
    let mut session = Session::new(&session_dir);
    session
        .open(session_id.as_deref())
        .context("failed to open session")?;
    info!(session_id = %session.id(), model = %config.chat.model, "chat started");

    let mut settings = Settings::from_config(&config);
    settings.verbose = verbose;

    let orchestrator = ChatOrchestrator::new(BoxCompletionClient::new(client));
    let mut state = ChatState::new(session, settings, orchestrator);
    state.info = vec![
        ("api-key".to_string(), mask_secret(&api_key)),
        ("base-url".to_string(), config.base_url.clone()),
        ("timeout".to_string(), format!("{}s", config.timeout_secs)),
        ("socks5".to_string(), config.socks5.clone().unwrap_or_default()),
        ("dir".to_string(), dirs.root().display().to_string()),
    ];
    let registry = build_registry(&mut state);
    let renderer = ChatRenderer::new();

    // Start-up input. A system prompt from the config file only seeds
    // fresh sessions and does not trigger a turn by itself.
    if let Some(system) = config.system.as_deref() {
        if args.system.is_some() || state.transcript().is_empty() {
            push_startup(&mut state, Message::system(system), args.pin);
        }
    }

    let reads_stdin = args.reads_stdin() || !std::io::stdin().is_terminal();
    let content = if reads_stdin {
        state.settings.non_interactive = true;
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read stdin")?;
        Some(buf)
    } else if let Some(path) = &args.file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Some(text)
    } else {
        None
    };
    if let Some(content) = content.filter(|c| !c.trim().is_empty()) {
        push_startup(&mut state, Message::user(content), args.pin);
    }

    let text = args.text.join(" ");
    if !text.trim().is_empty() {
        push_startup(&mut state, Message::user(text), args.pin);
    }

    if !std::io::stdout().is_terminal() {
        state.settings.non_interactive = true;
    }

    let initial = args.system.is_some() || !args.text.is_empty() || reads_stdin || args.file.is_some();
    if state.settings.non_interactive {
        if initial {
            run_startup(&mut state, &renderer, None).await?;
        }
        state.session.close()?;
        return Ok(());
    }

    print_welcome_banner(&state.settings.chat.model, state.session.id(), state.transcript().len());
    let (mut input, _writer) = ChatInput::new(state.prompt()).context("failed to initialize input")?;
    if initial {
        if let Err(err) = run_startup(&mut state, &renderer, Some(&mut input)).await {
            renderer.print_error(&err);
        }
    }

    run_repl(&mut state, &registry, &renderer, &mut input).await;
    input.flush();
    state.session.close()?;
    Ok(())
}

/// Answer the start-up messages.
async fn run_startup(
    state: &mut ChatState,
    renderer: &ChatRenderer,
    input: Option<&mut ChatInput>,
) -> Result<(), ChatError> {
    // The start-up messages must survive oneshot's reset on this turn.
    let oneshot = std::mem::replace(&mut state.settings.oneshot, false);
    let result = run_exchange(state, renderer, input, "").await;
    state.settings.oneshot = oneshot;
    result
}

async fn run_repl(
    state: &mut ChatState,
    registry: &CommandRegistry<ChatState>,
    renderer: &ChatRenderer,
    input: &mut ChatInput,
) {
    loop {
        input.update_prompt(&state.prompt());
        match input.read_line().await {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                renderer.print_notice("Press Ctrl+D or type :exit to quit.");
            }
            InputEvent::Line(line) => {
                eval_line(state, registry, renderer, input, &line).await;
                if state.exit {
                    break;
                }
            }
        }
    }
}

/// Evaluate one REPL line: a shell escape, a command, or chat text.
async fn eval_line(
    state: &mut ChatState,
    registry: &CommandRegistry<ChatState>,
    renderer: &ChatRenderer,
    input: &mut ChatInput,
    line: &str,
) {
    if line.is_empty() {
        return;
    }

    if let Some(command) = line.strip_prefix('$') {
        run_shell(state, renderer, command.trim()).await;
        return;
    }

    let text = if is_command(line) {
        match registry.dispatch_line(state, line) {
            Ok(output) => {
                if let Some(display) = &output.display {
                    renderer.print_display(display);
                }
                if let Some(prefix) = state.pending_read.take() {
                    match input.read_block().await {
                        Some(block) => join_block(&prefix, &block),
                        None => return,
                    }
                } else {
                    match output.feedback {
                        Some(feedback) => feedback,
                        None => return,
                    }
                }
            }
            Err(err) => {
                renderer.print_error(&err);
                return;
            }
        }
    } else {
        line.to_string()
    };

    if let Err(err) = run_exchange(state, renderer, Some(input), &text).await {
        renderer.print_error(&err);
    }
}

/// Run a turn, then hand the answer to the executor. With feedback on, the
/// executor's output is asked as the next question.
async fn run_exchange(
    state: &mut ChatState,
    renderer: &ChatRenderer,
    mut input: Option<&mut ChatInput>,
    text: &str,
) -> Result<(), ChatError> {
    let mut text = text.to_string();
    loop {
        let Some(answer) = run_turn(state, renderer, input.as_deref_mut(), &text).await? else {
            return Ok(());
        };
        let Some(executor) = state.settings.executor.clone() else {
            return Ok(());
        };
        let Some(output) = execute(state, renderer, input.as_deref_mut(), &executor, &answer).await else {
            return Ok(());
        };
        if !state.settings.feedback || output.trim().is_empty() {
            return Ok(());
        }
        text = output;
    }
}

/// Pipe `answer` into `executor` once the user agrees. Returns the output.
async fn execute(
    state: &ChatState,
    renderer: &ChatRenderer,
    input: Option<&mut ChatInput>,
    executor: &str,
    answer: &str,
) -> Option<String> {
    if answer.trim().is_empty() {
        return None;
    }
    let question = format!("execute the answer with `{executor}`?");
    let confirmed = match input {
        Some(input) => {
            input.update_prompt(&format!("{question} [y/N] "));
            let event = input.read_live().await;
            input.update_prompt(&state.prompt());
            is_yes(&event)
        }
        None if std::io::stdin().is_terminal() => Confirm::new()
            .with_prompt(question)
            .default(false)
            .interact()
            .unwrap_or_else(|err| {
                warn!(error = %err, "confirmation prompt failed");
                false
            }),
        None => {
            renderer.print_notice("executor skipped: no terminal to confirm on");
            return None;
        }
    };
    if !confirmed {
        return None;
    }

    match run_with_input(executor, answer).await {
        Ok(output) => {
            print!("{output}");
            Some(output)
        }
        Err(err) => {
            renderer.print_error(&err);
            None
        }
    }
}

/// A `:read` question: the prefix, then the lines read.
fn join_block(prefix: &str, block: &str) -> String {
    if prefix.is_empty() {
        block.to_string()
    } else {
        format!("{prefix}\n{block}")
    }
}

fn is_yes(event: &InputEvent) -> bool {
    matches!(
        event,
        InputEvent::Line(line) if line.eq_ignore_ascii_case("y") || line.eq_ignore_ascii_case("yes")
    )
}

/// Run `command` in the shell; its output becomes a user message.
async fn run_shell(state: &mut ChatState, renderer: &ChatRenderer, command: &str) {
    if command.is_empty() {
        renderer.print_error(&"usage: $ <command>");
        return;
    }
    match run_command(command).await {
        Ok(output) => {
            println!("{output}");
            state.push_message(Message::user(output));
        }
        Err(err) => renderer.print_error(&err),
    }
}

/// Run one chat turn with a spinner, live output, and Ctrl+C cancellation.
/// Returns the answer when one was received.
async fn run_turn(
    state: &mut ChatState,
    renderer: &ChatRenderer,
    mut input: Option<&mut ChatInput>,
    text: &str,
) -> Result<Option<String>, ChatError> {
    let cancel = CancellationToken::new();
    let verbose = state.settings.verbose;
    let has_input = input.is_some();
    let mut spinner: Option<ProgressBar> = None;
    let mut streamed = false;

    let result = {
        let on_event = |event: ChatEvent<'_>| match event {
            ChatEvent::Request { attempt } => {
                debug!(attempt, "request sent");
                if spinner.is_none() && !streamed {
                    spinner = Some(new_spinner());
                }
                if verbose && attempt > 1 {
                    notice(spinner.as_ref(), renderer, &format!("retrying, attempt {attempt}"));
                }
            }
            ChatEvent::Delta(delta) => {
                if let Some(spinner) = spinner.take() {
                    spinner.finish_and_clear();
                }
                streamed = true;
                renderer.print_delta(delta);
            }
            ChatEvent::Shrunk { removed } => {
                let text = format!("{removed} {} shrinked because of tokens limitation", plural(removed));
                notice(spinner.as_ref(), renderer, &text);
            }
        };

        let talk = state
            .orchestrator
            .talk(&mut state.session, &state.settings, text, &cancel, on_event);
        tokio::pin!(talk);

        loop {
            tokio::select! {
                result = &mut talk => break result,
                event = next_input(&mut input), if has_input && !cancel.is_cancelled() => match event {
                    InputEvent::Interrupted | InputEvent::Eof => cancel.cancel(),
                    // Evaluated once this turn is over.
                    InputEvent::Line(line) => {
                        if let Some(input) = input.as_deref_mut() {
                            input.queue(line);
                        }
                    }
                },
                _ = tokio::signal::ctrl_c(), if !has_input && !cancel.is_cancelled() => cancel.cancel(),
            }
        }
    };

    if let Some(spinner) = spinner.take() {
        spinner.finish_and_clear();
    }

    match result? {
        TurnOutcome::Idle => Ok(None),
        TurnOutcome::Completed { content, usage } => {
            if streamed {
                println!();
            } else if std::io::stdout().is_terminal() {
                println!("{}", renderer.render(state.settings.renderer, &content));
            } else {
                println!("{content}");
            }
            if let Some(usage) = usage.filter(|_| !state.settings.non_interactive) {
                renderer.print_cost(&usage);
            }
            if let Some(queued) = input.as_deref().map(ChatInput::queued).filter(|n| *n > 0) {
                let text = format!("{queued} queued {} will run next", line_word(queued));
                renderer.print_notice(&text);
            }
            Ok(Some(content))
        }
        TurnOutcome::Cancelled { partial } => {
            if !partial.is_empty() {
                println!();
            }
            renderer.print_notice("interrupted, the answer was not saved");
            Ok(None)
        }
    }
}

fn line_word(n: usize) -> &'static str {
    if n == 1 { "line" } else { "lines" }
}

async fn next_input(input: &mut Option<&mut ChatInput>) -> InputEvent {
    match input {
        Some(input) => input.read_line().await,
        None => std::future::pending().await,
    }
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn notice(spinner: Option<&ProgressBar>, renderer: &ChatRenderer, text: &str) {
    match spinner {
        Some(spinner) => spinner.suspend(|| renderer.print_notice(text)),
        None => renderer.print_notice(text),
    }
}

fn push_startup(state: &mut ChatState, message: Message, pin: bool) {
    if pin {
        state.push_pinned(message);
    } else {
        state.push_message(message);
    }
}
