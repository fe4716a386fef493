//! Configuration loader for Parley.
//!
//! Reads `config.toml` from the data directory (`~/.parley/` by default)
//! and deserializes it into [`ParleyConfig`]. Falls back to defaults when
//! the file is missing or malformed.
//!
//! `parley config` edits the same file as a raw [`toml::Table`] with dotted
//! keys (`chat.model`), so keys the program does not know survive a rewrite.

use std::io;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use parley_types::config::ParleyConfig;

/// Errors from reading or editing `config.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid key \"{0}\": use `name` or `section.name`")]
    InvalidKey(String),

    #[error("\"{0}\" is not a table")]
    NotATable(String),

    #[error("invalid value for \"{key}\": {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Load configuration from `config_path`.
///
/// - If the file does not exist, returns [`ParleyConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_config(config_path: &Path) -> ParleyConfig {
    let content = match tokio::fs::read_to_string(config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ParleyConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ParleyConfig::default();
        }
    };

    match toml::from_str::<ParleyConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ParleyConfig::default()
        }
    }
}

impl ConfigError {
    fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        ConfigError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read `config.toml` as a raw table; a missing file is an empty table.
pub async fn read_table(path: &Path) -> Result<Table, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Table::new()),
        Err(source) => return Err(ConfigError::io("read", path, source)),
    };
    content.parse::<Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `table` to `path`, creating the parent directory.
pub async fn write_table(path: &Path, table: &Table) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::io("create", parent, e))?;
    }
    let content = render_table(table)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ConfigError::io("write", path, e))?;
    tracing::debug!(path = %path.display(), "config written");
    Ok(())
}

/// The TOML text of `table`.
pub fn render_table(table: &Table) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(table)?)
}

/// Look up a `name` or `section.name` key.
pub fn get_value<'a>(table: &'a Table, key: &str) -> Result<Option<&'a Value>, ConfigError> {
    match split_key(key)? {
        (None, name) => Ok(table.get(name)),
        (Some(section), name) => match table.get(section) {
            None => Ok(None),
            Some(Value::Table(inner)) => Ok(inner.get(name)),
            Some(_) => Err(ConfigError::NotATable(section.to_string())),
        },
    }
}

/// Set a `name` or `section.name` key to `value`, parsed with
/// [`parse_value`].
///
/// The result must still load as a [`ParleyConfig`]; otherwise the table
/// is left unchanged.
pub fn set_value(table: &mut Table, key: &str, value: &str) -> Result<(), ConfigError> {
    let (section, name) = split_key(key)?;
    let mut updated = table.clone();
    let slot = match section {
        None => &mut updated,
        Some(section) => match updated
            .entry(section.to_string())
            .or_insert_with(|| Value::Table(Table::new()))
        {
            Value::Table(inner) => inner,
            _ => return Err(ConfigError::NotATable(section.to_string())),
        },
    };
    slot.insert(name.to_string(), parse_value(value));

    Value::Table(updated.clone())
        .try_into::<ParleyConfig>()
        .map_err(|source| ConfigError::InvalidValue {
            key: key.to_string(),
            source,
        })?;
    *table = updated;
    Ok(())
}

/// `true`/`false` become booleans, then integers and floats are tried;
/// anything else is a string.
pub fn parse_value(value: &str) -> Value {
    match value {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => value
            .parse::<i64>()
            .map(Value::Integer)
            .ok()
            .or_else(|| value.parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::Float))
            .unwrap_or_else(|| Value::String(value.to_string())),
    }
}

fn split_key(key: &str) -> Result<(Option<&str>, &str), ConfigError> {
    let mut parts = key.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) if !name.is_empty() => Ok((None, name)),
        (Some(section), Some(name), None) if !section.is_empty() && !name.is_empty() => Ok((Some(section), name)),
        _ => Err(ConfigError::InvalidKey(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).await;
        assert_eq!(config, ParleyConfig::default());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
base_url = "http://localhost:11434/v1"
oneshot = true

[chat]
model = "llama3"
stream = false
"#,
        )
        .await
        .unwrap();

        let config = load_config(&config_path).await;
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert!(config.oneshot);
        assert_eq!(config.chat.model, "llama3");
        assert!(!config.chat.stream);
        assert_eq!(config.timeout_secs, 180);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(&config_path).await;
        assert_eq!(config, ParleyConfig::default());
    }

    #[test]
    fn parse_value_types() {
        assert_eq!(parse_value("true"), Value::Boolean(true));
        assert_eq!(parse_value("false"), Value::Boolean(false));
        assert_eq!(parse_value("30"), Value::Integer(30));
        assert_eq!(parse_value("0.5"), Value::Float(0.5));
        assert_eq!(parse_value("inf"), Value::String("inf".to_string()));
        assert_eq!(parse_value("gpt-4"), Value::String("gpt-4".to_string()));
    }

    #[test]
    fn set_and_get_dotted_keys() {
        let mut table = Table::new();
        set_value(&mut table, "timeout_secs", "30").unwrap();
        set_value(&mut table, "chat.model", "gpt-4").unwrap();
        set_value(&mut table, "chat.stream", "false").unwrap();

        assert_eq!(get_value(&table, "timeout_secs").unwrap(), Some(&Value::Integer(30)));
        assert_eq!(get_value(&table, "chat.model").unwrap().and_then(Value::as_str), Some("gpt-4"));
        assert_eq!(get_value(&table, "chat.missing").unwrap(), None);
        assert_eq!(get_value(&table, "nothing.here").unwrap(), None);

        let config: ParleyConfig = Value::Table(table).try_into().unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.chat.stream);
    }

    #[test]
    fn set_rejects_bad_keys_and_values() {
        let mut table = Table::new();
        set_value(&mut table, "base_url", "http://localhost/v1").unwrap();
        let before = table.clone();

        for key in ["", "a.b.c", ".x", "chat."] {
            assert!(matches!(set_value(&mut table, key, "1"), Err(ConfigError::InvalidKey(_))), "{key}");
        }
        assert!(matches!(
            set_value(&mut table, "base_url.x", "1"),
            Err(ConfigError::NotATable(_))
        ));
        assert!(matches!(get_value(&table, "base_url.x"), Err(ConfigError::NotATable(_))));
        assert!(matches!(
            set_value(&mut table, "timeout_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(table, before);
    }

    #[tokio::test]
    async fn table_write_then_read_keeps_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        assert!(read_table(&path).await.unwrap().is_empty());

        let mut table = Table::new();
        table.insert("custom".to_string(), Value::String("kept".to_string()));
        set_value(&mut table, "socks5", "127.0.0.1:1080").unwrap();
        write_table(&path, &table).await.unwrap();

        assert_eq!(read_table(&path).await.unwrap(), table);
        let config = load_config(&path).await;
        assert_eq!(config.socks5.as_deref(), Some("127.0.0.1:1080"));
    }

    #[tokio::test]
    async fn read_table_reports_parse_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, "not = = toml").await.unwrap();
        assert!(matches!(read_table(&path).await, Err(ConfigError::Parse { .. })));
    }
}
