//! Welcome banner shown when the REPL starts.

use console::style;

use parley_infra::session::short_id;

pub fn print_welcome_banner(model: &str, session_id: &str, messages: usize) {
    println!();
    println!("  {}", style("parley").cyan().bold());
    println!();
    println!("  {}  {}", style("Model:").bold(), style(model).dim());
    println!("  {}  {}", style("Session:").bold(), style(short_id(session_id)).dim());
    if messages > 0 {
        println!("  {}  {}", style("Messages:").bold(), style(messages).dim());
    }
    println!();
    println!(
        "  {}",
        style("Type :help for commands, $ to run a shell command, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
