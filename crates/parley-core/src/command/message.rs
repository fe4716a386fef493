//! `:message` commands over the active transcript.

use clap::Parser;
use parley_types::error::CommandError;
use parley_types::message::{Message, Role};

use super::args;
use super::{CommandOutput, CommandRegistry};
use crate::host::TranscriptHost;
use crate::slice_expr::SliceExpr;

/// Register the `:message` command set and its short aliases.
pub fn register_message_commands<C: TranscriptHost + 'static>(registry: &mut CommandRegistry<C>) {
    registry
        .add(":message list", "list messages", list)
        .add(":message show", "show certain messages", show)
        .add(":message append", "append a message", append)
        .add_loggable(":message delete", "delete messages", delete)
        .add_loggable(":message shrink", "shrink messages to a begin:end window", shrink)
        .add_loggable(":message pin", "pin messages so pruning keeps them", pin)
        .add_loggable(":message unpin", "unpin messages", unpin)
        .add_loggable(":message reset", "drop every unpinned message", reset)
        .alias(":list", ":message list")
        .alias(":show", ":message show")
        .alias(":append", ":message append")
        .alias(":reset", ":message reset");
}

/// A registry holding only the message commands, used to replay journals
/// into a bare transcript.
pub fn replay_registry() -> CommandRegistry<crate::transcript::Transcript> {
    let mut registry = CommandRegistry::new();
    register_message_commands(&mut registry);
    registry
}

/// The command words that reproduce a journaled operation. A message
/// payload becomes `--role <role> -- <content>`.
pub fn replay_words(op: &str, message: Option<&Message>) -> Result<Vec<String>, CommandError> {
    let mut words = args::split(op)?;
    if let Some(message) = message {
        words.extend([
            "--role".to_string(),
            message.role.to_string(),
            "--".to_string(),
            message.content.clone(),
        ]);
    }
    Ok(words)
}

#[derive(Debug, Parser)]
#[command(name = ":message list")]
struct ListArgs {
    /// Show only the first N messages; 0 shows all
    #[arg(short = 'n', default_value_t = 0)]
    n: usize,
}

#[derive(Debug, Parser)]
#[command(name = ":message show")]
struct ShowArgs {
    /// Prefix each message with its role
    #[arg(short, long)]
    role: bool,
    #[arg(required = true)]
    indexes: Vec<usize>,
}

#[derive(Debug, Parser)]
#[command(name = ":message append")]
struct AppendArgs {
    #[arg(short, long, default_value = "user")]
    role: Role,
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    text: Vec<String>,
}

/// Arguments of the index-taking commands: delete, pin, unpin.
#[derive(Debug, Parser)]
struct IndexArgs {
    #[arg(required = true)]
    indexes: Vec<usize>,
}

#[derive(Debug, Parser)]
#[command(name = ":message shrink")]
struct ShrinkArgs {
    /// A `begin:end` window; omitted keeps everything
    #[arg(allow_hyphen_values = true)]
    expr: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = ":message reset")]
struct ResetArgs {}

fn list<C: TranscriptHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let ListArgs { n } = args::parse(args)?;

    let entries = host.transcript().entries();
    let take = if n == 0 { entries.len() } else { n };
    let lines: Vec<String> = entries
        .iter()
        .take(take)
        .enumerate()
        .map(|(i, entry)| {
            let json = serde_json::to_string(&entry.message).unwrap_or_default();
            let pin = if entry.pinned { " (pinned)" } else { "" };
            format!("{i:>3}. {json}{pin}")
        })
        .collect();

    if lines.is_empty() {
        return Ok(CommandOutput::none());
    }
    Ok(CommandOutput::display(lines.join("\n")))
}

fn show<C: TranscriptHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let parsed: ShowArgs = args::parse(args)?;

    let mut out = String::new();
    for index in parsed.indexes {
        let Some(entry) = host.transcript().get(index) else {
            continue;
        };
        if parsed.role {
            out.push_str(&format!("{}:\n\n", entry.message.role));
        }
        out.push_str(&entry.message.content);
        out.push_str("\n\n");
    }
    Ok(CommandOutput::display(out))
}

fn append<C: TranscriptHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let AppendArgs { role, text } = args::parse(args)?;
    // Journaled with the message as payload rather than as a command line.
    host.push_message(Message::new(role, text.join(" ")));
    Ok(CommandOutput::none())
}

fn delete<C: TranscriptHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let indexes = parse_indexes(":message delete", args)?;
    host.transcript_mut().delete(&indexes)?;
    Ok(CommandOutput::none())
}

fn shrink<C: TranscriptHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let ShrinkArgs { expr } = args::parse(args)?;
    let expr: SliceExpr = expr.as_deref().unwrap_or_default().parse()?;
    let removed = host.transcript_mut().shrink(&expr);
    Ok(CommandOutput::display(format!("{removed} {} removed", plural(removed))))
}

fn pin<C: TranscriptHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let indexes = parse_indexes(":message pin", args)?;
    host.transcript_mut().pin(&indexes);
    Ok(CommandOutput::none())
}

fn unpin<C: TranscriptHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let indexes = parse_indexes(":message unpin", args)?;
    host.transcript_mut().unpin(&indexes);
    Ok(CommandOutput::none())
}

fn reset<C: TranscriptHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let ResetArgs {} = args::parse(args)?;
    host.transcript_mut().clear_unpinned();
    Ok(CommandOutput::none())
}

fn parse_indexes(name: &'static str, args: &[String]) -> Result<Vec<usize>, CommandError> {
    let IndexArgs { indexes } = args::parse_as(name, args)?;
    Ok(indexes)
}

/// "message" or "messages".
pub fn plural(n: usize) -> &'static str {
    if n == 1 { "message" } else { "messages" }
}
