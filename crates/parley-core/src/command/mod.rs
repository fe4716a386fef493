//! The `:` command registry.
//!
//! A [`CommandRegistry`] maps multi-word command paths (`:message delete`,
//! `:session stack push`) to handlers over a context `C`. It is built once
//! at startup and passed by reference to whoever dispatches.
//!
//! Commands that mutate the transcript are registered as *loggable*: after
//! such a command succeeds, the registry journals the canonical invocation
//! through [`TranscriptHost::record`], so replaying the journal runs the
//! exact same handler with the exact same arguments.

pub mod args;
pub mod message;

use parley_types::error::CommandError;

use crate::host::TranscriptHost;

/// What a command hands back to the REPL.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text to show the user.
    pub display: Option<String>,
    /// Text to feed back into the chat pipeline as if the user typed it.
    pub feedback: Option<String>,
}

impl CommandOutput {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn display(text: impl Into<String>) -> Self {
        Self {
            display: Some(text.into()),
            feedback: None,
        }
    }

    /// Attach feedback text; empty text is dropped.
    pub fn with_feedback(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.feedback = (!text.trim().is_empty()).then_some(text);
        self
    }
}

type Handler<C> = Box<dyn Fn(&mut C, &[String]) -> Result<CommandOutput, CommandError> + Send + Sync>;

/// One registered command.
pub struct Command<C> {
    path: Vec<String>,
    description: String,
    loggable: bool,
    handler: Handler<C>,
}

impl<C> Command<C> {
    /// The command path, e.g. `:message delete`.
    pub fn path(&self) -> String {
        self.path.join(" ")
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

struct Alias {
    words: Vec<String>,
    target: Vec<String>,
}

/// Registry of `:` commands over a context `C`.
pub struct CommandRegistry<C> {
    commands: Vec<Command<C>>,
    aliases: Vec<Alias>,
}

impl<C> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            aliases: Vec::new(),
        }
    }
}

impl<C> CommandRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command that does not mutate the transcript.
    pub fn add<F>(&mut self, path: &str, description: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut C, &[String]) -> Result<CommandOutput, CommandError> + Send + Sync + 'static,
    {
        self.insert(path, description, false, Box::new(handler))
    }

    /// Register a transcript-mutating command whose invocations are journaled.
    pub fn add_loggable<F>(&mut self, path: &str, description: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut C, &[String]) -> Result<CommandOutput, CommandError> + Send + Sync + 'static,
    {
        self.insert(path, description, true, Box::new(handler))
    }

    /// Make `alias` expand to `target`. The target may carry arguments,
    /// e.g. `:session clear` -> `:session shrink 0:0`.
    pub fn alias(&mut self, alias: &str, target: &str) -> &mut Self {
        self.aliases.push(Alias {
            words: words(alias),
            target: words(target),
        });
        self
    }

    /// `(alias, target)` pairs in registration order.
    pub fn aliases(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.aliases
            .iter()
            .map(|a| (a.words.join(" "), a.target.join(" ")))
    }

    /// Find the command for `words`, expanding aliases first.
    ///
    /// The longest matching path wins, so `:session stack push` is preferred
    /// over `:session stack`. Returns the command and its arguments.
    pub fn resolve(&self, words: &[String]) -> Option<(&Command<C>, Vec<String>)> {
        let expanded = self.expand_alias(words);
        self.commands
            .iter()
            .filter(|cmd| expanded.starts_with(&cmd.path))
            .max_by_key(|cmd| cmd.path.len())
            .map(|cmd| (cmd, expanded[cmd.path.len()..].to_vec()))
    }

    /// One `path  description` row per command and alias, sorted by path.
    pub fn help(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = self
            .commands
            .iter()
            .map(|cmd| (cmd.path(), cmd.description.clone()))
            .chain(
                self.aliases()
                    .map(|(alias, target)| (alias, format!("alias of {target}"))),
            )
            .collect();
        rows.sort();
        rows
    }

    fn insert(&mut self, path: &str, description: &str, loggable: bool, handler: Handler<C>) -> &mut Self {
        self.commands.push(Command {
            path: words(path),
            description: description.to_string(),
            loggable,
            handler,
        });
        self
    }

    fn expand_alias(&self, words: &[String]) -> Vec<String> {
        let alias = self
            .aliases
            .iter()
            .filter(|a| words.starts_with(&a.words))
            .max_by_key(|a| a.words.len());
        match alias {
            Some(alias) => alias
                .target
                .iter()
                .chain(&words[alias.words.len()..])
                .cloned()
                .collect(),
            None => words.to_vec(),
        }
    }
}

impl<C: TranscriptHost> CommandRegistry<C> {
    /// Run the command named by `words`.
    ///
    /// On success of a loggable command, the canonical invocation is
    /// journaled through the context.
    pub fn dispatch(&self, ctx: &mut C, words: &[String]) -> Result<CommandOutput, CommandError> {
        let (command, rest) = self
            .resolve(words)
            .ok_or_else(|| CommandError::Unknown(words.join(" ")))?;

        // Quote before running so an invocation that cannot be journaled
        // never mutates the transcript.
        let journal = match command.loggable {
            true => Some(args::join(&[command.path.as_slice(), rest.as_slice()].concat())?),
            false => None,
        };

        let output = (command.handler)(ctx, &rest)?;

        if let Some(line) = journal {
            ctx.record(&line, None);
        }
        Ok(output)
    }

    /// Split `line` and dispatch it.
    pub fn dispatch_line(&self, ctx: &mut C, line: &str) -> Result<CommandOutput, CommandError> {
        self.dispatch(ctx, &args::split(line)?)
    }
}

/// Registered paths and aliases are plain words.
fn words(path: &str) -> Vec<String> {
    path.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;
    use parley_types::message::Message;

    fn registry() -> CommandRegistry<RecordingHost> {
        let mut registry = CommandRegistry::new();
        registry
            .add(":session stack", "show", |_, _| Ok(CommandOutput::display("stack")))
            .add(":session stack push", "push", |_, args| {
                Ok(CommandOutput::none().with_feedback(args.join(" ")))
            })
            .add_loggable(":message append", "append", |host: &mut RecordingHost, args| {
                host.transcript.push(Message::user(args.join(" ")));
                Ok(CommandOutput::none())
            })
            .alias(">", ":session stack push")
            .alias(":clear", ":message append cleared");
        registry
    }

    fn split(line: &str) -> Vec<String> {
        args::split(line).unwrap()
    }

    #[test]
    fn test_longest_path_wins() {
        let registry = registry();
        let mut host = RecordingHost::default();
        let out = registry.dispatch_line(&mut host, ":session stack push hello there").unwrap();
        assert_eq!(out.feedback.as_deref(), Some("hello there"));

        let out = registry.dispatch_line(&mut host, ":session stack").unwrap();
        assert_eq!(out.display.as_deref(), Some("stack"));
    }

    #[test]
    fn test_alias_expansion_keeps_trailing_args() {
        let registry = registry();
        let (cmd, rest) = registry.resolve(&split("> topic")).unwrap();
        assert_eq!(cmd.path(), ":session stack push");
        assert_eq!(rest, vec!["topic".to_string()]);
    }

    #[test]
    fn test_alias_with_arguments() {
        let registry = registry();
        let mut host = RecordingHost::default();
        registry.dispatch_line(&mut host, ":clear").unwrap();
        assert_eq!(host.transcript.get(0).unwrap().message.content, "cleared");
        assert_eq!(host.records[0].0, ":message append cleared");
    }

    #[test]
    fn test_loggable_command_is_journaled_with_quoting() {
        let registry = registry();
        let mut host = RecordingHost::default();
        registry
            .dispatch(&mut host, &split(r#":message append "two words""#))
            .unwrap();
        assert_eq!(host.records.len(), 1);
        assert_eq!(split(&host.records[0].0), split(r#":message append "two words""#));
    }

    #[test]
    fn test_plain_command_is_not_journaled() {
        let registry = registry();
        let mut host = RecordingHost::default();
        registry.dispatch_line(&mut host, ":session stack").unwrap();
        assert!(host.records.is_empty());
    }

    #[test]
    fn test_unknown_command() {
        let registry = registry();
        let mut host = RecordingHost::default();
        let err = registry.dispatch_line(&mut host, ":nope 1").unwrap_err();
        assert!(matches!(err, CommandError::Unknown(ref s) if s == ":nope 1"));
        assert!(registry.resolve(&split(":nope")).is_none());
        assert!(registry.resolve(&split("> x")).is_some());
    }

    #[test]
    fn test_unjournalable_command_does_not_run() {
        let registry = registry();
        let mut host = RecordingHost::default();
        let words = vec![":message".to_string(), "append".to_string(), "nul\0byte".to_string()];
        let err = registry.dispatch(&mut host, &words).unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
        assert!(host.transcript.is_empty());
        assert!(host.records.is_empty());
    }

    #[test]
    fn test_unbalanced_quotes_are_rejected() {
        let registry = registry();
        let mut host = RecordingHost::default();
        let err = registry.dispatch_line(&mut host, ":message append 'oops").unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
        assert!(host.transcript.is_empty());
    }

    #[test]
    fn test_help_lists_commands_and_aliases() {
        let registry = registry();
        let help = registry.help();
        assert!(help.iter().any(|(path, _)| path == ":message append"));
        assert!(help.iter().any(|(path, desc)| path == ">" && desc.contains(":session stack push")));
    }
}
