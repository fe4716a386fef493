//! REPL-level `:` commands and the registry the chat loop dispatches into.

use clap::Parser;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use parley_core::command::args;
use parley_core::command::message::register_message_commands;
use parley_core::command::{CommandOutput, CommandRegistry};
use parley_infra::session::commands::register_session_commands;
use parley_types::error::CommandError;

use super::state::ChatState;

/// Build the registry with every command the REPL understands, and store
/// the help rows in `state`.
pub fn build_registry(state: &mut ChatState) -> CommandRegistry<ChatState> {
    let mut registry = CommandRegistry::new();
    register_message_commands(&mut registry);
    register_session_commands(&mut registry);
    register_repl_commands(&mut registry);
    state.help = registry.help();
    registry
}

/// Register `:help`, `:exit`, `:read`, `:set`, `:info` and `:resp`.
pub fn register_repl_commands(registry: &mut CommandRegistry<ChatState>) {
    registry
        .add(":help", "show available commands", help)
        .add(":exit", "exit parley", exit)
        .add(":read", "read a multi-line question, end it with a line holding only '.'", read)
        .add(":set", "set an option: :set <name> [value]", set)
        .add(":info", "show the current options", info)
        .add(":resp", "show the raw responses of this run", resp)
        .alias(":quit", ":exit");
}

/// Whether a REPL line goes to the command registry.
pub fn is_command(line: &str) -> bool {
    line.starts_with([':', '>', '<'])
}

/// Mask a secret for display, keeping a short prefix.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(3).collect();
    let hidden = secret.chars().count().saturating_sub(3).min(48);
    format!("{prefix}{}", "*".repeat(hidden))
}

fn help(state: &mut ChatState, _args: &[String]) -> Result<CommandOutput, CommandError> {
    let width = state.help.iter().map(|(path, _)| path.len()).max().unwrap_or(0);
    let lines: Vec<String> = state
        .help
        .iter()
        .map(|(path, description)| format!("  {path:<width$}  {description}"))
        .collect();
    Ok(CommandOutput::display(lines.join("\n")))
}

fn exit(state: &mut ChatState, _args: &[String]) -> Result<CommandOutput, CommandError> {
    state.exit = true;
    Ok(CommandOutput::none())
}

#[derive(Debug, Parser)]
#[command(name = ":read")]
struct ReadArgs {
    /// Text put before the lines that are read
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    prompt: Vec<String>,
}

fn read(state: &mut ChatState, args: &[String]) -> Result<CommandOutput, CommandError> {
    let ReadArgs { prompt } = args::parse(args)?;
    state.pending_read = Some(prompt.join(" "));
    Ok(CommandOutput::display(
        "enter the text, end with a line holding only '.' (Ctrl+D also ends, Ctrl+C aborts)",
    ))
}

#[derive(Debug, Parser)]
#[command(name = ":set")]
struct SetArgs {
    /// Option name, as listed by `:info`
    name: String,
    /// New value; omitted sets a flag or clears an optional value
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    value: Vec<String>,
}

fn set(state: &mut ChatState, args: &[String]) -> Result<CommandOutput, CommandError> {
    let SetArgs { name, value } = args::parse(args)?;
    let value = (!value.is_empty()).then(|| value.join(" "));

    state.schema.set(&mut state.settings, &name, value.as_deref())?;
    let current = state
        .schema
        .find(&name)
        .map(|setting| setting.get(&state.settings))
        .unwrap_or_default();
    Ok(CommandOutput::display(format!("{name} = {current}")))
}

fn info(state: &mut ChatState, _args: &[String]) -> Result<CommandOutput, CommandError> {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Option").fg(Color::White),
        Cell::new("Value").fg(Color::White),
        Cell::new("").fg(Color::White),
    ]);

    for (name, value) in &state.info {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(value).fg(Color::Red),
            Cell::new("fixed"),
        ]);
    }
    for setting in state.schema.iter() {
        table.add_row(vec![
            Cell::new(setting.name),
            Cell::new(setting.get(&state.settings)).fg(Color::Cyan),
            Cell::new(setting.description),
        ]);
    }
    Ok(CommandOutput::display(table.to_string()))
}

fn resp(state: &mut ChatState, _args: &[String]) -> Result<CommandOutput, CommandError> {
    let mut lines = Vec::new();
    for (i, answer) in state.orchestrator.client().responses().iter().enumerate() {
        let json = serde_json::to_string(answer).map_err(|e| CommandError::Failed(e.to_string()))?;
        lines.push(format!("{i:>3}. {json}"));
    }
    Ok(CommandOutput::display(lines.join("\n")))
}
