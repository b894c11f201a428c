//! Rewrites relative URLs in HTML so wkhtmltopdf can resolve them.
//!
//! Markup piped over stdin has no base URL, so `href="/app.css"` and
//! `src="//cdn.example.com/x.png"` would otherwise point nowhere. Two
//! independent passes fix that:
//!
//! - host-relative (`/path`) values get the root URL prepended,
//! - protocol-relative (`//host/path`) values get an explicit scheme.
//!
//! Everything else (whitespace, attribute order, quote style) is left
//! byte-for-byte identical.

use crate::consts::{RELATIVE_PATH_REGEX, RELATIVE_PROTOCOL_REGEX};
use regex::Captures;
use tracing::instrument;

/// Applies the host-relative pass when `root_url` is given and the
/// protocol-relative pass when `protocol` is given.
///
/// `root_url` should end in `/`; one is appended when missing.
///
/// ```
/// use pagekit_render::preprocess::process;
/// let html = r#"<img src="/x.png"><link href="//fonts.example.com/a.css">"#;
/// assert_eq!(
///     process(html, Some("http://example.com/"), Some("http")),
///     r#"<img src="http://example.com/x.png"><link href="http://fonts.example.com/a.css">"#,
/// );
/// ```
#[instrument(skip(html), fields(html_size = html.len()))]
pub fn process(html: &str, root_url: Option<&str>, protocol: Option<&str>) -> String {
    let html = match root_url {
        Some(root) => translate_relative_paths(html, root),
        None => html.to_string(),
    };
    match protocol {
        Some(protocol) => translate_relative_protocols(&html, protocol),
        None => html,
    }
}

fn translate_relative_paths(html: &str, root_url: &str) -> String {
    let root = if root_url.ends_with('/') { root_url.to_string() } else { format!("{root_url}/") };
    RELATIVE_PATH_REGEX
        .replace_all(html, |caps: &Captures| {
            let rest = caps.get(3).map_or("", |m| m.as_str());
            format!("{}={}{}{}{}", &caps[1], &caps[2], root, rest, &caps[2])
        })
        .into_owned()
}

fn translate_relative_protocols(html: &str, protocol: &str) -> String {
    RELATIVE_PROTOCOL_REGEX
        .replace_all(html, |caps: &Captures| format!("{}={}{}://{}{}", &caps[1], &caps[2], protocol, &caps[3], &caps[2]))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ROOT_URL: &str = "http://example.com/";
    const PROTOCOL: &str = "http";
    const MIXED: &str = "<link href='//fonts.googleapis.com/css?family=Open+Sans:400,600' rel='stylesheet' type='text/css'><a href='/'><img src='/logo.jpg'></a>";

    #[rstest]
    #[case(
        "<html><head><link href='/stylesheets/application.css' media='screen' rel='stylesheet' type='text/css' /></head><body><img alt='test' src=\"/test.png\" /></body></html>",
        "<html><head><link href='http://example.com/stylesheets/application.css' media='screen' rel='stylesheet' type='text/css' /></head><body><img alt='test' src=\"http://example.com/test.png\" /></body></html>"
    )]
    #[case(
        "<link href=\"/stylesheets/application.css\" media=\"screen\" rel=\"stylesheet\" type=\"text/css\" />",
        "<link href=\"http://example.com/stylesheets/application.css\" media=\"screen\" rel=\"stylesheet\" type=\"text/css\" />"
    )]
    #[case(
        "<link href='//fonts.googleapis.com/css?family=Open+Sans:400,600' rel='stylesheet' type='text/css'>",
        "<link href='http://fonts.googleapis.com/css?family=Open+Sans:400,600' rel='stylesheet' type='text/css'>"
    )]
    #[case(
        "<link href=\"//fonts.googleapis.com/css?family=Open+Sans:400,600\" rel='stylesheet' type='text/css'>",
        "<link href=\"http://fonts.googleapis.com/css?family=Open+Sans:400,600\" rel='stylesheet' type='text/css'>"
    )]
    #[case(
        "<a href='/'><img src='/logo.jpg' ></a>",
        "<a href='http://example.com/'><img src='http://example.com/logo.jpg' ></a>"
    )]
    #[case("<img src=\"/x.png\">", "<img src=\"http://example.com/x.png\">")]
    #[case("<a href=\"https://other.org/\">x</a>", "<a href=\"https://other.org/\">x</a>")]
    #[case("<a href=\"page.html\">x</a>", "<a href=\"page.html\">x</a>")]
    #[case("NO MATCH", "NO MATCH")]
    fn test_process(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(process(input, Some(ROOT_URL), Some(PROTOCOL)), expected);
    }

    #[test]
    fn test_without_root_url() {
        assert_eq!(
            process(MIXED, None, Some(PROTOCOL)),
            "<link href='http://fonts.googleapis.com/css?family=Open+Sans:400,600' rel='stylesheet' type='text/css'><a href='/'><img src='/logo.jpg'></a>"
        );
    }

    #[test]
    fn test_without_protocol() {
        assert_eq!(
            process(MIXED, Some(ROOT_URL), None),
            "<link href='//fonts.googleapis.com/css?family=Open+Sans:400,600' rel='stylesheet' type='text/css'><a href='http://example.com/'><img src='http://example.com/logo.jpg'></a>"
        );
    }

    #[test]
    fn test_without_either() {
        assert_eq!(process(MIXED, None, None), MIXED);
    }

    #[test]
    fn test_root_url_gains_trailing_slash() {
        assert_eq!(process("<img src='/a.png'>", Some("https://example.com"), None), "<img src='https://example.com/a.png'>");
    }

    #[test]
    fn test_replacement_is_literal() {
        // `$` in the root must not be treated as a capture group reference.
        assert_eq!(process("<img src='/a.png'>", Some("http://h/$1/"), None), "<img src='http://h/$1/a.png'>");
    }
}
