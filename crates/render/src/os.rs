//! Shell quoting for displaying commands.
//!
//! Conversions are spawned with a discrete argv and never pass through a
//! shell. The quoting here only makes [`Invocation::command_line`]
//! copy-pasteable into a terminal for diagnostics.
//!
//! [`Invocation::command_line`]: crate::invoke::Invocation::command_line

use std::borrow::Cow;

/// Characters reserved by `cmd.exe`, escaped with a caret.
const WINDOWS_RESERVED: [char; 7] = ['&', '|', '(', ')', '<', '>', '^'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}
impl Platform {
    pub const fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }

    /// Quotes a single argument so the platform's shell reads it back verbatim.
    pub fn quote<'a>(&self, arg: &'a str) -> Cow<'a, str> {
        match self {
            Self::Unix => quote_posix(arg),
            Self::Windows => quote_windows(arg),
        }
    }

    /// Quotes every argument and joins them with spaces.
    pub fn join<I, S>(&self, args: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        args.into_iter()
            .map(|arg| self.quote(arg.as_ref()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_posix(arg: &str) -> Cow<'_, str> {
    if arg.is_empty() {
        return Cow::Borrowed("''");
    }
    let safe = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ',' | ':' | '/' | '@' | '=' | '+' | '%'));
    if safe {
        return Cow::Borrowed(arg);
    }
    Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
}

fn quote_windows(arg: &str) -> Cow<'_, str> {
    if arg.is_empty() {
        return Cow::Borrowed("\"\"");
    }
    let needs_carets = arg.contains(WINDOWS_RESERVED);
    let needs_quotes = arg.chars().any(char::is_whitespace);
    if !needs_carets && !needs_quotes {
        return Cow::Borrowed(arg);
    }
    let mut out = String::with_capacity(arg.len() + 8);
    if needs_quotes {
        out.push('"');
    }
    for c in arg.chars() {
        if WINDOWS_RESERVED.contains(&c) {
            out.push('^');
        }
        out.push(c);
    }
    if needs_quotes {
        out.push('"');
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("--page-size", "--page-size")]
    #[case("", "''")]
    #[case("Hello World", "'Hello World'")]
    #[case("it's", r"'it'\''s'")]
    #[case("$(rm -rf /)", "'$(rm -rf /)'")]
    #[case("https://example.com/?a=1&b=2", "'https://example.com/?a=1&b=2'")]
    fn test_quote_posix(#[case] arg: &str, #[case] expected: &str) {
        assert_eq!(Platform::Unix.quote(arg), expected);
    }

    #[rstest]
    #[case("--page-size", "--page-size")]
    #[case("a&b", "a^&b")]
    #[case("(x|y)", "^(x^|y^)")]
    #[case("<^>", "^<^^^>")]
    #[case("Hello World", "\"Hello World\"")]
    fn test_quote_windows(#[case] arg: &str, #[case] expected: &str) {
        assert_eq!(Platform::Windows.quote(arg), expected);
    }

    #[test]
    fn test_join() {
        assert_eq!(Platform::Unix.join(["--title", "Q3 report", "-"]), "--title 'Q3 report' -");
        assert_eq!(Platform::Windows.join(["--replace", "a", "b&c"]), "--replace a b^&c");
    }
}
