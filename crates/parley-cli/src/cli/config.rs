//! `parley config`: show, query, and edit config.toml.
//!
//! ```bash
//! parley config                   # print the file
//! parley config chat.model        # print one value
//! parley config chat.model gpt-4  # set one value
//! parley config --init            # prompt for the API key and proxy
//! ```

use anyhow::Result;
use console::style;
use dialoguer::{Input, Password};

use parley_infra::config::{get_value, read_table, render_table, set_value, write_table};
use parley_infra::filesystem::{DataDirs, resolve_data_dir};

use super::ConfigArgs;
use super::chat::commands::mask_secret;

pub async fn run_config(args: ConfigArgs) -> Result<()> {
    let dirs = DataDirs::new(resolve_data_dir(args.dir.as_deref()));
    let path = dirs.config_path();
    let mut table = read_table(&path).await?;

    if args.key.is_none() && (args.init || !path.exists()) {
        let api_key: String = Password::new()
            .with_prompt("api-key (required)")
            .allow_empty_password(true)
            .interact()?;
        let socks5: String = Input::new()
            .with_prompt("socks5 (if any)")
            .allow_empty(true)
            .interact_text()?;
        if api_key.is_empty() && socks5.is_empty() {
            return Ok(());
        }

        for (key, value) in [("api_key", api_key.as_str()), ("socks5", socks5.trim())] {
            if !value.is_empty() {
                set_value(&mut table, key, value)?;
            }
        }
        write_table(&path, &table).await?;
        println!(
            "  {} Wrote {} (api-key {})",
            style("✓").green().bold(),
            path.display(),
            mask_secret(&api_key)
        );
        return Ok(());
    }

    let Some(key) = args.key else {
        print!("{}", render_table(&table)?);
        return Ok(());
    };

    match args.value {
        None => {
            if let Some(value) = get_value(&table, &key)? {
                match value.as_str() {
                    Some(text) => println!("{text}"),
                    None => println!("{value}"),
                }
            }
        }
        Some(value) => {
            set_value(&mut table, &key, &value)?;
            write_table(&path, &table).await?;
            tracing::info!(key = %key, "config updated");
        }
    }
    Ok(())
}
