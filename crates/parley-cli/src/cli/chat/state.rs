//! Everything the REPL commands operate on.

use console::style;

use parley_core::chat::ChatOrchestrator;
use parley_core::host::TranscriptHost;
use parley_core::settings::SettingsSchema;
use parley_core::transcript::Transcript;
use parley_infra::session::Session;
use parley_infra::session::commands::SessionHost;
use parley_types::config::Settings;
use parley_types::message::Message;

/// The command context of the REPL.
pub struct ChatState {
    pub session: Session,
    pub settings: Settings,
    pub schema: SettingsSchema,
    pub orchestrator: ChatOrchestrator,
    /// Fixed `(name, value)` facts listed by `:info` above the settings.
    pub info: Vec<(String, String)>,
    /// `(command, description)` rows for `:help`, filled once the registry
    /// is built.
    pub help: Vec<(String, String)>,
    /// Set by `:exit`.
    pub exit: bool,
    /// Set by `:read`: the first line of a multi-line question the REPL
    /// reads next.
    pub pending_read: Option<String>,
}

impl ChatState {
    pub fn new(session: Session, settings: Settings, orchestrator: ChatOrchestrator) -> Self {
        Self {
            session,
            settings,
            schema: SettingsSchema::new(),
            orchestrator,
            info: Vec::new(),
            help: Vec::new(),
            exit: false,
            pending_read: None,
        }
    }

    /// `parley >` plus one `>` per stacked session.
    pub fn prompt(&self) -> String {
        let depth = self.session.stack().len().saturating_sub(1);
        format!(
            "{} {} ",
            style("parley").green().bold(),
            style(">".repeat(depth + 1)).green()
        )
    }
}

impl TranscriptHost for ChatState {
    fn transcript(&self) -> &Transcript {
        self.session.transcript()
    }

    fn transcript_mut(&mut self) -> &mut Transcript {
        self.session.transcript_mut()
    }

    fn record(&mut self, op: &str, message: Option<&Message>) {
        self.session.record(op, message);
    }
}

impl SessionHost for ChatState {
    fn session(&self) -> &Session {
        &self.session
    }

    fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}
