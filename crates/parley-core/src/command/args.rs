//! Command-line splitting, quoting, and argument parsing for `:` commands.
//!
//! Lines are split and joined with POSIX shell rules via [`shlex`], so any
//! argument list joined with [`join`] splits back into the same list. The
//! history journal relies on this to store a command invocation as a single
//! line. Arguments are parsed into a per-command `clap` struct by [`parse`].

use clap::Parser;
use parley_types::error::CommandError;

/// Split a command line into words with shell quoting rules.
///
/// Fails on an unterminated quote or a trailing backslash.
pub fn split(line: &str) -> Result<Vec<String>, CommandError> {
    shlex::split(line).ok_or_else(|| CommandError::InvalidArgument(format!("unbalanced quotes in '{line}'")))
}

/// Join arguments into one line, quoting where needed.
///
/// Fails only for arguments containing a NUL byte.
pub fn join<S: AsRef<str>>(args: &[S]) -> Result<String, CommandError> {
    shlex::try_join(args.iter().map(AsRef::as_ref))
        .map_err(|e| CommandError::InvalidArgument(format!("cannot quote arguments: {e}")))
}

/// Parse the arguments of one command into `P`.
///
/// `args` excludes the command path; the name given with
/// `#[command(name = ...)]` is used as the program name in usage and help.
pub fn parse<P: Parser>(args: &[String]) -> Result<P, CommandError> {
    let command = P::command();
    let argv = std::iter::once(command.get_name().to_string()).chain(args.iter().cloned());
    P::try_parse_from(argv).map_err(usage)
}

/// Like [`parse`], for argument structs shared by several commands.
pub fn parse_as<P: Parser>(name: &'static str, args: &[String]) -> Result<P, CommandError> {
    let argv = std::iter::once(name.to_string()).chain(args.iter().cloned());
    P::command()
        .name(name)
        .try_get_matches_from(argv)
        .and_then(|matches| P::from_arg_matches(&matches))
        .map_err(usage)
}

fn usage(err: clap::Error) -> CommandError {
    CommandError::Usage(err.render().to_string().trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[derive(Debug, Parser)]
    #[command(name = ":demo")]
    struct DemoArgs {
        #[arg(short, long, default_value = "user")]
        role: String,
        #[arg(short, long)]
        verbose: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    }

    #[test]
    fn test_split_plain_words() {
        assert_eq!(split("  :message   delete 1 2 ").unwrap(), strings(&[":message", "delete", "1", "2"]));
    }

    #[test]
    fn test_split_quotes() {
        assert_eq!(
            split(r#":append "hello world" 'it"s' """#).unwrap(),
            strings(&[":append", "hello world", "it\"s", ""])
        );
    }

    #[test]
    fn test_split_unbalanced_quote_fails() {
        assert!(matches!(split(r#":append "never closed"#), Err(CommandError::InvalidArgument(_))));
    }

    #[test]
    fn test_join_split_roundtrip() {
        let args = strings(&[
            ":message",
            "append",
            "--role",
            "user",
            "multi\nline \"quoted\" text with \\ backslash",
            "",
            "it's",
            "# not a comment",
        ]);
        assert_eq!(split(&join(&args).unwrap()).unwrap(), args);
    }

    #[test]
    fn test_join_rejects_nul() {
        assert!(join(&["a\0b"]).is_err());
    }

    #[test]
    fn test_parse_flags_and_trailing_text() {
        let parsed: DemoArgs = parse(&strings(&["-v", "-r", "system", "be", "-v", "brief"])).unwrap();
        assert_eq!(parsed.role, "system");
        assert!(parsed.verbose);
        assert_eq!(parsed.text, strings(&["be", "-v", "brief"]));
    }

    #[test]
    fn test_parse_long_equals_and_double_dash() {
        let parsed: DemoArgs = parse(&strings(&["--role=assistant", "--", "--role", "x"])).unwrap();
        assert_eq!(parsed.role, "assistant");
        assert_eq!(parsed.text, strings(&["--role", "x"]));
    }

    #[test]
    fn test_parse_as_names_the_command() {
        match parse_as::<DemoArgs>(":other", &strings(&["--bogus"])) {
            Err(CommandError::Usage(text)) => assert!(text.contains(":other"), "{text}"),
            other => panic!("expected usage error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_value_is_usage() {
        match parse::<DemoArgs>(&strings(&["--role"])) {
            Err(CommandError::Usage(text)) => assert!(text.contains(":demo"), "{text}"),
            other => panic!("expected usage error, got {other:?}"),
        }
    }
}
