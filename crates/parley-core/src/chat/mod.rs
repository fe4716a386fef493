//! Chat turns: send the transcript, collect the answer, recover from
//! context-length failures by shrinking and retrying.

mod orchestrator;

pub use orchestrator::{ChatEvent, ChatOrchestrator, TurnOutcome};
