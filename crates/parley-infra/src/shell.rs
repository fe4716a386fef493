//! Shell escapes (`$ command` in the REPL) and the answer executor.

use std::io;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Errors from running a shell command.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid executor command: {0}")]
    InvalidCommand(String),

    /// The command exited non-zero; the message is its output.
    #[error("{output}")]
    Failed { code: Option<i32>, output: String },
}

/// Run `command` through `sh -c` and return stdout followed by stderr.
///
/// A non-zero exit is an error carrying the same output.
pub async fn run_command(command: &str) -> Result<String, ShellError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .map_err(|source| ShellError::Spawn {
            command: command.to_string(),
            source,
        })?;

    combined(command, output)
}

/// Run the executor `command` with `input` on its stdin and return stdout
/// followed by stderr.
///
/// The command line is split with shell quoting rules and run directly,
/// without a shell.
pub async fn run_with_input(command: &str, input: &str) -> Result<String, ShellError> {
    let words = shlex::split(command)
        .filter(|words| !words.is_empty())
        .ok_or_else(|| ShellError::InvalidCommand(command.to_string()))?;
    let spawn_error = |source| ShellError::Spawn {
        command: command.to_string(),
        source,
    };

    let mut child = Command::new(&words[0])
        .args(&words[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    if let Some(mut stdin) = child.stdin.take() {
        // A command that exits without reading its input closes the pipe.
        if let Err(err) = stdin.write_all(input.as_bytes()).await {
            if err.kind() != io::ErrorKind::BrokenPipe {
                return Err(spawn_error(err));
            }
        }
    }

    let output = child.wait_with_output().await.map_err(spawn_error)?;
    combined(command, output)
}

fn combined(command: &str, output: Output) -> Result<String, ShellError> {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    debug!(command, code = ?output.status.code(), bytes = text.len(), "shell command finished");

    if !output.status.success() {
        return Err(ShellError::Failed {
            code: output.status.code(),
            output: text,
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_captures_output() {
        let out = run_command("echo hello; echo oops 1>&2").await.unwrap();
        assert_eq!(out, "hello\noops\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error_with_output() {
        let err = run_command("echo broken; exit 3").await.unwrap_err();
        match err {
            ShellError::Failed { code, output } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "broken\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_executor_reads_input_from_stdin() {
        let out = run_with_input("sh -c 'tr a-z A-Z; echo done >&2'", "ls -la\n").await.unwrap();
        assert_eq!(out, "LS -LA\ndone\n");
    }

    #[tokio::test]
    async fn test_executor_ignores_unread_input() {
        let out = run_with_input("echo \"quoted arg\"", &"x".repeat(1 << 20)).await.unwrap();
        assert_eq!(out, "quoted arg\n");
    }

    #[tokio::test]
    async fn test_executor_errors() {
        assert!(matches!(run_with_input("  ", "").await, Err(ShellError::InvalidCommand(_))));
        assert!(matches!(run_with_input("'unclosed", "").await, Err(ShellError::InvalidCommand(_))));
        assert!(matches!(
            run_with_input("parley-no-such-binary", "").await,
            Err(ShellError::Spawn { .. })
        ));
        assert!(matches!(run_with_input("false", "").await, Err(ShellError::Failed { .. })));
    }
}
