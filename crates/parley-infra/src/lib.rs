//! Infrastructure layer for Parley.
//!
//! Contains the I/O behind the abstractions in `parley-core`: the JSONL
//! session journal, on-disk sessions and their `:session` commands, the
//! OpenAI-compatible completion client, configuration loading, data
//! directory layout, and shell escapes.

pub mod config;
pub mod filesystem;
pub mod history;
pub mod llm;
pub mod session;
pub mod shell;
