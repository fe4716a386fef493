//! Interactive chat for Parley.
//!
//! The REPL reads a line, routes `:` commands (and the `>`/`<` stack
//! shortcuts) through the command registry, runs `$` lines in the shell,
//! and sends everything else to the model. Entry point:
//! `loop_runner::run_chat`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
pub mod state;
