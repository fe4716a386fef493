//! Shared domain types for Parley.
//!
//! Conversation messages, the history journal record, the completion API
//! wire shapes, configuration, and the error enums shared across layers.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod message;
