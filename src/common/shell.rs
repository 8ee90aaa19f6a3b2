//! Shell utility functions
//!
//! Commands are stored as plain strings in rollback journals and shown to the
//! operator in dry runs, so we need a lossless round trip between an argv
//! vector and a single shell line.

use anyhow::{Context, Result};

/// Escape a string for use in a shell command
///
/// Quotes only when needed, using single quotes.
///
/// # Examples
///
/// ```
/// use stackctl::common::shell::shell_quote;
///
/// assert_eq!(shell_quote("simple"), "simple");
/// assert_eq!(shell_quote("has spaces"), "'has spaces'");
/// assert_eq!(shell_quote("has'quote"), "'has'\\''quote'");
/// ```
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }

    if s.chars().all(|c| {
        c.is_alphanumeric() || matches!(c, '-' | '_' | '=' | '/' | '.' | ':' | ',' | '+' | '@')
    }) {
        return s.to_string();
    }

    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Render a program and its arguments as one shell line
pub fn join_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(shell_quote(program))
        .chain(args.iter().map(|a| shell_quote(a.as_ref())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a shell line back into program and arguments
pub fn split_command(line: &str) -> Result<(String, Vec<String>)> {
    let mut words =
        shell_words::split(line).with_context(|| format!("parsing command line `{}`", line))?;
    if words.is_empty() {
        anyhow::bail!("empty command line");
    }
    let program = words.remove(0);
    Ok((program, words))
}
