//! Conversion input classification.
//!
//! A [`Source`] is classified exactly once, when it is constructed, and the
//! classification decides how the input reaches wkhtmltopdf: URLs and file
//! paths become one discrete argv element each, while inline HTML is written
//! to the child's stdin (signalled by the `-` sentinel). No source text is
//! ever interpolated into a shell string.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Tells wkhtmltopdf to read input from stdin, or write output to stdout.
pub const STDIO_SENTINEL: &str = "-";

/// Characters left untouched when escaping a URL: RFC 2396 unreserved and
/// reserved characters, plus `[` and `]`. Everything else (including `%`) is
/// percent-encoded.
const URL_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'[')
    .remove(b']');

/// The input of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Markup held in memory, piped to wkhtmltopdf over stdin.
    Html(String),
    /// A file on disk, passed by absolute path.
    File(PathBuf),
    /// A remote document, passed as an escaped URL.
    Url(String),
}
impl Source {
    /// Classifies text: anything starting with `http` (case-sensitive) is a
    /// URL, everything else is HTML. Only the scheme prefix is checked.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.starts_with("http") { Self::Url(text) } else { Self::Html(text) }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// The markup of an HTML source.
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Html(html) => Some(html),
            _ => None,
        }
    }

    /// The argv element that names this source for wkhtmltopdf.
    ///
    /// - HTML: the stdin sentinel `-`.
    /// - File: the absolute path, unescaped.
    /// - URL: the URL, percent-escaped unless it already is.
    pub fn to_input_for_command(&self) -> Result<OsString> {
        Ok(match self {
            Self::Html(_) => OsString::from(STDIO_SENTINEL),
            Self::File(path) => std::path::absolute(path).or_raise(|| ErrorKind::Io)?.into_os_string(),
            Self::Url(url) => OsString::from(escape_url(url)?),
        })
    }
}
impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}
impl From<String> for Source {
    fn from(text: String) -> Self {
        Self::from_text(text)
    }
}
impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}
impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}
impl From<&NamedTempFile> for Source {
    fn from(file: &NamedTempFile) -> Self {
        Self::File(file.path().to_path_buf())
    }
}

/// Percent-escapes unsafe characters, unless the URL is already escaped.
///
/// "Already escaped" is detected by round-tripping: if unescaping and then
/// re-escaping reproduces the input, the input is left alone. This is a
/// heuristic; a URL with a literal `%` that happens to look like an escape
/// sequence is assumed to be escaped.
///
/// The result must parse as an absolute URL, otherwise
/// [`ErrorKind::InvalidSource`] is returned.
///
/// ```
/// use pagekit_render::source::escape_url;
/// assert_eq!(escape_url("https://www.google.com/search?q=foo bar").unwrap(), "https://www.google.com/search?q=foo%20bar");
/// assert_eq!(escape_url("https://www.google.com/search?q=foo%20bar").unwrap(), "https://www.google.com/search?q=foo%20bar");
/// ```
pub fn escape_url(url: &str) -> Result<String> {
    let escaped = if needs_escaping(url) { escape(url) } else { url.to_string() };
    if let Err(e) = url::Url::parse(&escaped) {
        tracing::debug!(url = %escaped, error = %e, "Source URL failed to parse");
        exn::bail!(ErrorKind::InvalidSource(escaped));
    }
    Ok(escaped)
}

fn escape(url: &str) -> String {
    utf8_percent_encode(url, URL_SAFE).to_string()
}

fn needs_escaping(url: &str) -> bool {
    escape(&percent_decode_str(url).decode_utf8_lossy()) != url
}
