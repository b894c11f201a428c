//! Conversion options declared inside HTML documents.
//!
//! A document can carry its own options as `<meta>` tags:
//!
//! ```html
//! <meta name="pdfkit-page_size" content="Legal">
//! <meta name="pdfkit-cookie session" content="abc123">
//! ```
//!
//! The first becomes `page_size: "Legal"`. Names with whitespace denote
//! tuples, so the second becomes `cookie: {session: "abc123"}`.

use crate::consts::META_SELECTOR;
use crate::options::{Options, Value};
use indexmap::IndexMap;
use scraper::Html;
use tracing::instrument;

/// Collects the options declared by `<meta>` tags whose name starts with `prefix`.
///
/// Parsing is tolerant: malformed markup, attribute order and quote style do
/// not matter. Tags with an empty name (after the prefix) or empty content
/// are ignored. When the same name appears twice, the last tag wins.
#[instrument(skip(html), fields(html_size = html.len()))]
pub fn find_options(html: &str, prefix: &str) -> Options {
    let document = Html::parse_document(html);
    let mut found = Options::new();
    for meta in document.select(&META_SELECTOR) {
        let (Some(name), Some(content)) = (meta.attr("name"), meta.attr("content")) else {
            continue;
        };
        let Some(name) = name.strip_prefix(prefix) else {
            continue;
        };
        let content = content.trim();
        let mut parts = name.split_whitespace();
        let Some(key) = parts.next() else {
            continue;
        };
        if content.is_empty() {
            tracing::trace!(name = key, "Skipping meta directive without content");
            continue;
        }
        let sub_key = parts.collect::<Vec<_>>().join(" ");
        if sub_key.is_empty() {
            found.insert(key.to_string(), Value::from(content));
            continue;
        }
        let entry = found.entry(key.to_string()).or_insert_with(|| Value::Map(IndexMap::new()));
        match entry {
            Value::Map(map) => {
                map.insert(sub_key, Value::from(content));
            },
            // A plain directive of the same name came first; the tuple form replaces it.
            other => *other = [(sub_key, content)].into_iter().collect(),
        }
    }
    tracing::debug!(count = found.len(), "Meta directives found");
    found
}
