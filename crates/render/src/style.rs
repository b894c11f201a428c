//! Stylesheets inlined into HTML documents before rendering.
//!
//! Stylesheets are read eagerly when added, so that missing files fail fast
//! rather than halfway through a conversion. They can only be attached to
//! HTML sources; see [`Document::with_stylesheet`](crate::Document::with_stylesheet).

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const NEEDLE: &[u8] = b"</head>";

/// An ordered collection of CSS stylesheets. Later styles override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheets {
    styles: Vec<String>,
}
impl Stylesheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stylesheet read from a file on disk.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            exn::bail!(ErrorKind::AssetNotFound(path.display().to_string()));
        }
        let mut file = File::open(path).or_raise(|| ErrorKind::Io)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf).or_raise(|| ErrorKind::Io)?;
        self.styles.push(buf);
        Ok(self)
    }

    /// Appends raw CSS content as a stylesheet. This is infallible since no
    /// I/O is involved.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.styles.push(content.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Inserts one `<style>` block per stylesheet immediately before the first
    /// `</head>` (matched case-insensitively). Without a `</head>`, the blocks
    /// are prepended to the document.
    pub fn inject(&self, html: &str) -> String {
        if self.styles.is_empty() {
            return html.to_string();
        }
        let mut out = String::with_capacity(html.len() + self.styles.iter().map(|s| s.len() + 15).sum::<usize>());
        match html.as_bytes().windows(NEEDLE.len()).position(|w| w.eq_ignore_ascii_case(NEEDLE)) {
            // `pos` is at an ASCII `<`, so always a char boundary.
            Some(pos) => {
                out.push_str(&html[..pos]);
                self.push_styles(&mut out);
                out.push_str(&html[pos..]);
                tracing::debug!(position = pos, blocks = self.styles.len(), "Stylesheets injected into HTML head");
            },
            None => {
                self.push_styles(&mut out);
                out.push_str(html);
                tracing::debug!(blocks = self.styles.len(), "Closing head tag not found; stylesheets prepended");
            },
        }
        out
    }

    fn push_styles(&self, out: &mut String) {
        for style in &self.styles {
            out.push_str("<style>");
            out.push_str(style);
            out.push_str("</style>");
        }
    }
}
