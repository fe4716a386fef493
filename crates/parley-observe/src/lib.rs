//! Observability for Parley: structured logging via `tracing`.

pub mod tracing_setup;
