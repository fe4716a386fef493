//! Core business logic for Parley.
//!
//! This crate holds everything that does not touch the filesystem or the
//! network: the pin-aware [`transcript::Transcript`], the slice expression
//! grammar, the `:` command registry with the message command set, the
//! runtime settings schema, the completion client abstraction, and the chat
//! orchestrator with its shrink-and-retry policy.
//!
//! Concrete I/O lives in `parley-infra`.

pub mod chat;
pub mod command;
pub mod host;
pub mod llm;
pub mod settings;
pub mod slice_expr;
pub mod transcript;
