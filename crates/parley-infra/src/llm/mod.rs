//! Completion API clients.

pub mod openai;
