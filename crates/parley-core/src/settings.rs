//! Enumerated schema for runtime-adjustable settings (`:set`, `:info`).
//!
//! Every adjustable option is listed explicitly with a typed getter and
//! setter over [`Settings`]. Options that are fixed for the process
//! (API key, base URL, data directory) are not part of the schema.

use std::fmt::Display;
use std::str::FromStr;

use parley_types::config::{RenderMode, Settings};
use parley_types::error::CommandError;

type Getter = fn(&Settings) -> String;
type Setter = fn(&mut Settings, &str) -> Result<(), String>;

/// One adjustable option.
pub struct Setting {
    pub name: &'static str,
    pub description: &'static str,
    get: Getter,
    set: Setter,
}

impl Setting {
    pub fn get(&self, settings: &Settings) -> String {
        (self.get)(settings)
    }

    /// Parse `value` and store it. An empty value sets a boolean to `true`
    /// and clears an optional value.
    pub fn set(&self, settings: &mut Settings, value: &str) -> Result<(), CommandError> {
        (self.set)(settings, value)
            .map_err(|reason| CommandError::InvalidArgument(format!("{}: {reason}", self.name)))
    }
}

/// The list of adjustable options, built once at startup.
pub struct SettingsSchema {
    settings: Vec<Setting>,
}

impl Default for SettingsSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsSchema {
    pub fn new() -> Self {
        let settings = vec![
            Setting {
                name: "chat.model",
                description: "ID of the model to use",
                get: |s| s.chat.model.clone(),
                set: |s, v| {
                    if v.is_empty() {
                        return Err("model cannot be empty".to_string());
                    }
                    s.chat.model = v.to_string();
                    Ok(())
                },
            },
            Setting {
                name: "chat.temperature",
                description: "sampling temperature, between 0 and 2",
                get: |s| s.chat.temperature.to_string(),
                set: |s, v| {
                    s.chat.temperature = parse_num(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "chat.top_p",
                description: "nucleus sampling probability mass",
                get: |s| s.chat.top_p.to_string(),
                set: |s, v| {
                    s.chat.top_p = parse_num(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "chat.n",
                description: "how many choices to generate per request",
                get: |s| s.chat.n.to_string(),
                set: |s, v| {
                    s.chat.n = parse_num(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "chat.stop",
                description: "sequence where the model stops generating",
                get: |s| s.chat.stop.clone().unwrap_or_default(),
                set: |s, v| {
                    s.chat.stop = opt_text(v);
                    Ok(())
                },
            },
            Setting {
                name: "chat.stream",
                description: "stream the answer as it is generated",
                get: |s| s.chat.stream.to_string(),
                set: |s, v| {
                    s.chat.stream = parse_bool(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "chat.max_tokens",
                description: "maximum tokens to generate (empty for no limit)",
                get: |s| opt_display(s.chat.max_tokens),
                set: |s, v| {
                    s.chat.max_tokens = parse_opt_num(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "chat.presence_penalty",
                description: "penalty for tokens already present, -2.0 to 2.0",
                get: |s| opt_display(s.chat.presence_penalty),
                set: |s, v| {
                    s.chat.presence_penalty = parse_opt_num(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "chat.frequency_penalty",
                description: "penalty by token frequency, -2.0 to 2.0",
                get: |s| opt_display(s.chat.frequency_penalty),
                set: |s, v| {
                    s.chat.frequency_penalty = parse_opt_num(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "chat.user",
                description: "end-user identifier sent with requests",
                get: |s| s.chat.user.clone().unwrap_or_default(),
                set: |s, v| {
                    s.chat.user = opt_text(v);
                    Ok(())
                },
            },
            Setting {
                name: "disable-auto-shrink",
                description: "fail instead of shrinking on context length errors",
                get: |s| s.disable_auto_shrink.to_string(),
                set: |s, v| {
                    s.disable_auto_shrink = parse_bool(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "non-interactive",
                description: "skip the cost line after blocking answers",
                get: |s| s.non_interactive.to_string(),
                set: |s, v| {
                    s.non_interactive = parse_bool(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "oneshot",
                description: "drop unpinned messages before every turn",
                get: |s| s.oneshot.to_string(),
                set: |s, v| {
                    s.oneshot = parse_bool(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "renderer",
                description: "how answers are printed: text, markdown or json",
                get: |s| s.renderer.to_string(),
                set: |s, v| {
                    s.renderer = v.parse::<RenderMode>()?;
                    Ok(())
                },
            },
            Setting {
                name: "executor",
                description: "command each answer is piped into after confirmation (empty to disable)",
                get: |s| s.executor.clone().unwrap_or_default(),
                set: |s, v| {
                    s.executor = opt_text(v.trim());
                    Ok(())
                },
            },
            Setting {
                name: "feedback",
                description: "send the executor output back as the next question",
                get: |s| s.feedback.to_string(),
                set: |s, v| {
                    s.feedback = parse_bool(v)?;
                    Ok(())
                },
            },
            Setting {
                name: "verbose",
                description: "print verbose messages",
                get: |s| s.verbose.to_string(),
                set: |s, v| {
                    s.verbose = parse_bool(v)?;
                    Ok(())
                },
            },
        ];
        Self { settings }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    pub fn find(&self, name: &str) -> Option<&Setting> {
        self.settings.iter().find(|s| s.name == name)
    }

    /// Set `name` to `value` (empty when omitted).
    pub fn set(&self, settings: &mut Settings, name: &str, value: Option<&str>) -> Result<(), CommandError> {
        let setting = self
            .find(name)
            .ok_or_else(|| CommandError::InvalidArgument(format!("unknown setting: {name}")))?;
        setting.set(settings, value.unwrap_or_default())
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    if value.is_empty() {
        return Ok(true);
    }
    value
        .parse::<bool>()
        .map_err(|e| format!("'{value}': {e}"))
}

fn parse_num<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse::<T>().map_err(|e| format!("'{value}': {e}"))
}

fn parse_opt_num<T>(value: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    if value.is_empty() {
        return Ok(None);
    }
    parse_num(value).map(Some)
}

fn opt_text(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn opt_display<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
