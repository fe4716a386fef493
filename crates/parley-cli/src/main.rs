//! Parley entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, sets up tracing, then prints shell completions,
//! edits the config file, or runs a chat.

mod cli;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    parley_observe::tracing_setup::init_tracing(cli.verbose)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    match cli.command {
        Some(Commands::Config(args)) => cli::config::run_config(args).await,
        _ => cli::chat::loop_runner::run_chat(cli.chat, cli.verbose > 0).await,
    }
}
