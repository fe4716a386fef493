//! `:session` commands.

use clap::Parser;
use parley_core::command::args;
use parley_core::command::{CommandOutput, CommandRegistry};
use parley_core::host::TranscriptHost;
use parley_core::slice_expr::SliceExpr;
use parley_types::error::CommandError;

use super::{Session, SessionError, list_ids, short_id};

/// A command context that owns the active [`Session`].
pub trait SessionHost: TranscriptHost {
    fn session(&self) -> &Session;

    fn session_mut(&mut self) -> &mut Session;
}

impl SessionHost for Session {
    fn session(&self) -> &Session {
        self
    }

    fn session_mut(&mut self) -> &mut Session {
        self
    }
}

/// Register the `:session` command set and its aliases.
pub fn register_session_commands<C: SessionHost + 'static>(registry: &mut CommandRegistry<C>) {
    registry
        .add(":session new", "create a new session", new)
        .add(":session remove", "delete a session", remove)
        .add(":session shrink", "keep sessions in a begin:end window, delete the rest", shrink)
        .add(":session list", "list sessions", list)
        .add(":session switch", "switch to another session", switch)
        .add(":session history", "print the journal of the current session", history)
        .add(":session stack", "show the session stack", stack)
        .add(":session stack push", "step into a new session, keeping the current one", stack_push)
        .add(":session stack pop", "leave the current session for the one below it", stack_pop)
        .alias(":session clear", ":session shrink 0:0")
        .alias(":stack", ":session stack")
        .alias(">", ":session stack push")
        .alias("<", ":session stack pop");
}

/// Arguments of `:session new` and `:session stack push`.
#[derive(Debug, Parser)]
struct OpenArgs {
    /// Id of the session; a fresh one is minted when omitted
    #[arg(short, long)]
    session_id: Option<String>,
    /// Text to send once the session is open
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    text: Vec<String>,
}

/// Arguments of `:session remove` and `:session switch`.
#[derive(Debug, Parser)]
struct IdArgs {
    id: String,
}

#[derive(Debug, Parser)]
#[command(name = ":session shrink")]
struct ShrinkArgs {
    /// A `begin:end` window over the sorted session list
    #[arg(allow_hyphen_values = true)]
    expr: Option<String>,
}

#[derive(Debug, Parser)]
struct NoArgs {}

fn new<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let OpenArgs { session_id, text } = args::parse_as(":session new", args)?;
    let id = session_id.filter(|id| !id.is_empty());
    let session = host.session_mut();
    if let Some(id) = &id {
        if session.exists(id)? {
            return Err(SessionError::AlreadyExists(id.clone()).into());
        }
    }

    session.open(id.as_deref())?;
    Ok(CommandOutput::display(format!("session {} created", session.id())).with_feedback(text.join(" ")))
}

fn remove<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let IdArgs { id } = args::parse_as(":session remove", args)?;
    host.session().remove(&id)?;
    Ok(CommandOutput::display(format!("{id} removed")))
}

fn shrink<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let ShrinkArgs { expr } = args::parse(args)?;
    let expr: SliceExpr = expr.as_deref().unwrap_or_default().parse()?;
    let removed = host.session().shrink(&expr)?;
    if removed.is_empty() {
        return Ok(CommandOutput::none());
    }
    let lines: Vec<String> = removed.iter().map(|id| format!("{id} removed")).collect();
    Ok(CommandOutput::display(lines.join("\n")))
}

fn list<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let NoArgs {} = args::parse_as(":session list", args)?;
    let session = host.session();
    let lines: Vec<String> = list_ids(session.dir())?
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            if id == session.id() {
                format!("  *  {id}")
            } else {
                format!("{i:>3}. {id}")
            }
        })
        .collect();
    Ok(CommandOutput::display(lines.join("\n")))
}

fn switch<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let IdArgs { id } = args::parse_as(":session switch", args)?;
    let session = host.session_mut();
    if !session.exists(&id)? {
        return Err(SessionError::NotFound(id).into());
    }
    session.open(Some(&id))?;
    Ok(CommandOutput::display(format!("switched to session {id}")))
}

fn history<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let NoArgs {} = args::parse_as(":session history", args)?;
    let mut lines = Vec::new();
    for (i, record) in host.session().history().iter().enumerate() {
        let json = serde_json::to_string(record).map_err(|e| CommandError::Failed(e.to_string()))?;
        lines.push(format!("{i:>3}. {json}"));
    }
    Ok(CommandOutput::display(lines.join("\n")))
}

fn stack<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let NoArgs {} = args::parse_as(":session stack", args)?;
    let line: String = host
        .session()
        .stack()
        .iter()
        .map(|id| format!(" > {}", short_id(id)))
        .collect();
    Ok(CommandOutput::display(line))
}

fn stack_push<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let OpenArgs { session_id, text } = args::parse_as(":session stack push", args)?;
    let session = host.session_mut();
    session.push(session_id.as_deref())?;
    Ok(CommandOutput::display(format!("step in session: {}", session.id())).with_feedback(text.join(" ")))
}

fn stack_pop<C: SessionHost>(host: &mut C, args: &[String]) -> Result<CommandOutput, CommandError> {
    let NoArgs {} = args::parse_as(":session stack pop", args)?;
    let session = host.session_mut();
    if !session.pop()? {
        return Ok(CommandOutput::none());
    }
    Ok(CommandOutput::display(format!("back to session: {}", session.id())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::command::message::register_message_commands;
    use parley_types::message::Message;
    use tempfile::TempDir;

    fn history_lines(tmp: &TempDir, id: &str) -> usize {
        std::fs::read_to_string(tmp.path().join(id)).unwrap().lines().count()
    }

    fn setup(tmp: &TempDir) -> (CommandRegistry<Session>, Session) {
        let mut registry = CommandRegistry::new();
        register_message_commands(&mut registry);
        register_session_commands(&mut registry);
        let mut session = Session::new(tmp.path());
        session.open(Some("root")).unwrap();
        (registry, session)
    }

    #[test]
    fn test_message_commands_are_journaled_in_session() {
        let tmp = TempDir::new().unwrap();
        let (registry, mut session) = setup(&tmp);
        registry.dispatch_line(&mut session, ":append hello").unwrap();
        registry.dispatch_line(&mut session, ":append world").unwrap();
        registry.dispatch_line(&mut session, ":message pin 1").unwrap();
        registry.dispatch_line(&mut session, ":list").unwrap();

        let ops: Vec<&str> = session.history().iter().map(|r| r.op.as_str()).collect();
        assert_eq!(ops, vec![":message append", ":message append", ":message pin 1"]);

        let out = registry.dispatch_line(&mut session, ":session history").unwrap();
        assert_eq!(out.display.unwrap().lines().count(), 3);
    }

    #[test]
    fn test_new_with_existing_id_fails() {
        let tmp = TempDir::new().unwrap();
        let (registry, mut session) = setup(&tmp);
        let err = registry
            .dispatch_line(&mut session, ":session new -s root")
            .unwrap_err();
        assert_eq!(err.to_string(), "session \"root\" exist");
        assert_eq!(session.id(), "root");
    }

    #[test]
    fn test_new_switches_and_returns_text_as_feedback() {
        let tmp = TempDir::new().unwrap();
        let (registry, mut session) = setup(&tmp);
        let out = registry
            .dispatch_line(&mut session, ":session new -s topic what is rust")
            .unwrap();
        assert_eq!(session.id(), "topic");
        assert_eq!(out.display.as_deref(), Some("session topic created"));
        assert_eq!(out.feedback.as_deref(), Some("what is rust"));
    }

    #[test]
    fn test_switch_requires_existing_session() {
        let tmp = TempDir::new().unwrap();
        let (registry, mut session) = setup(&tmp);
        assert!(registry.dispatch_line(&mut session, ":session switch ghost").is_err());
        assert!(matches!(
            registry.dispatch_line(&mut session, ":session switch"),
            Err(CommandError::Usage(_))
        ));
        assert_eq!(session.id(), "root");
    }

    #[test]
    fn test_switch_and_remove_reject_paths() {
        let tmp = TempDir::new().unwrap();
        let (registry, mut session) = setup(&tmp);
        for line in [":session switch ..", ":session remove ../root", ":session switch /etc/hosts"] {
            let err = registry.dispatch_line(&mut session, line).unwrap_err();
            assert!(err.to_string().contains("invalid session id"), "{line}: {err}");
        }
        assert!(matches!(
            registry.dispatch_line(&mut session, ":session new -s ../up"),
            Err(CommandError::Failed(_))
        ));
        assert_eq!(session.id(), "root");
    }

    #[test]
    fn test_switch_to_corrupt_session_keeps_current() {
        let tmp = TempDir::new().unwrap();
        let (registry, mut session) = setup(&tmp);
        registry.dispatch_line(&mut session, ":append kept").unwrap();
        std::fs::write(tmp.path().join("broken"), "not json\n").unwrap();

        assert!(registry.dispatch_line(&mut session, ":session switch broken").is_err());
        assert_eq!(session.id(), "root");
        registry.dispatch_line(&mut session, ":append still journaled").unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(history_lines(&tmp, "root"), 2);
    }

    #[test]
    fn test_list_marks_current() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("other"), "").unwrap();
        let (registry, mut session) = setup(&tmp);
        let out = registry.dispatch_line(&mut session, ":session list").unwrap();
        assert_eq!(out.display.as_deref(), Some("  0. other\n  *  root"));
    }

    #[test]
    fn test_stack_push_pop_via_aliases() {
        let tmp = TempDir::new().unwrap();
        let (registry, mut session) = setup(&tmp);
        registry.dispatch_line(&mut session, ":append at root").unwrap();

        let out = registry.dispatch_line(&mut session, "> -s nested explain").unwrap();
        assert_eq!(out.display.as_deref(), Some("step in session: nested"));
        assert_eq!(out.feedback.as_deref(), Some("explain"));

        let out = registry.dispatch_line(&mut session, ":stack").unwrap();
        assert_eq!(out.display.as_deref(), Some(" > root > nested"));

        registry.dispatch_line(&mut session, "<").unwrap();
        assert_eq!(session.id(), "root");
        assert_eq!(session.transcript().messages(), vec![Message::user("at root")]);

        let out = registry.dispatch_line(&mut session, "<").unwrap();
        assert_eq!(out, CommandOutput::none());
    }

    #[test]
    fn test_clear_removes_everything_but_active() {
        let tmp = TempDir::new().unwrap();
        for id in ["a", "b"] {
            std::fs::write(tmp.path().join(id), "").unwrap();
        }
        let (registry, mut session) = setup(&tmp);
        registry.dispatch_line(&mut session, ":append keep").unwrap();

        let out = registry.dispatch_line(&mut session, ":session clear").unwrap();
        assert_eq!(out.display.as_deref(), Some("a removed\nb removed"));
        assert_eq!(list_ids(tmp.path()).unwrap(), vec!["root"]);
    }

    #[test]
    fn test_remove_active_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (registry, mut session) = setup(&tmp);
        let err = registry
            .dispatch_line(&mut session, ":session remove root")
            .unwrap_err();
        assert!(err.to_string().contains("active"));
    }
}
