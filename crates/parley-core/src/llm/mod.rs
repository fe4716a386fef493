//! Completion client abstraction.
//!
//! - `client`: the [`client::CompletionClient`] trait implemented by concrete
//!   backends (see `parley-infra`).
//! - `box_client`: type-erased wrapper for dynamic dispatch.

pub mod box_client;
pub mod client;
