//! Rewriting `.pdf` requests so the wrapped handler serves plain HTML.

use http::header::{ACCEPT, HOST};
use http::uri::{PathAndQuery, Uri};
use http::{HeaderValue, Request};

const HTML_MIME: &str = "text/html";

/// Marks a request the middleware intends to convert.
///
/// Found in [`Request::extensions`] by the wrapped handler, which can use it
/// to tweak its markup for print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderingPdf;

/// Where relative links in the response should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Origin {
    pub(crate) root_url: Option<String>,
    pub(crate) protocol: String,
}
impl Origin {
    /// `<scheme>://<host>/`, with the host from the `Host` header or else the
    /// URI. The scheme defaults to `http`, as server-side URIs rarely carry one.
    pub(crate) fn of<B>(request: &Request<B>) -> Self {
        let protocol = request.uri().scheme_str().unwrap_or("http").to_string();
        let host = request
            .headers()
            .get(HOST)
            .and_then(|host| host.to_str().ok())
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .or_else(|| request.uri().authority().map(|authority| authority.to_string()));
        let root_url = host.map(|host| format!("{protocol}://{host}/"));
        Self { root_url, protocol }
    }
}

/// Strips `.pdf` from the path, keeps the query, prefers HTML in `Accept`
/// and marks the request with [`RenderingPdf`].
pub(crate) fn rewrite<B>(request: &mut Request<B>) {
    let uri = request.uri().clone();
    let path = uri.path().strip_suffix(".pdf").unwrap_or(uri.path());
    let path = if path.is_empty() { "/" } else { path };
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.into_parts();
    match path_and_query.parse::<PathAndQuery>() {
        Ok(rewritten) => parts.path_and_query = Some(rewritten),
        Err(e) => tracing::warn!(error = %e, path = %path_and_query, "Could not rewrite request path"),
    }
    match Uri::from_parts(parts) {
        Ok(rewritten) => *request.uri_mut() = rewritten,
        Err(e) => tracing::warn!(error = %e, "Could not rebuild request URI"),
    }

    let accept = prefer_html(request.headers().get(ACCEPT).and_then(|accept| accept.to_str().ok()));
    if let Ok(accept) = HeaderValue::from_str(&accept) {
        request.headers_mut().insert(ACCEPT, accept);
    }
    request.extensions_mut().insert(RenderingPdf);
}

/// Puts `text/html` in front of the existing `Accept` values.
pub(crate) fn prefer_html(accept: Option<&str>) -> String {
    std::iter::once(HTML_MIME)
        .chain(accept.into_iter().flat_map(|accept| accept.split(',')).filter(|value| !value.trim().is_empty()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn request(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[rstest]
    #[case("/public/file.pdf", "/public/file")]
    #[case("/sub/public/file.pdf", "/sub/public/file")]
    #[case("/reports/q3.pdf?year=2024&draft", "/reports/q3?year=2024&draft")]
    #[case("/.pdf", "/")]
    #[case("http://example.org/public/file.pdf", "http://example.org/public/file")]
    fn test_rewrite(#[case] uri: &str, #[case] expected: &str) {
        let mut request = request(uri);
        rewrite(&mut request);
        assert_eq!(request.uri().to_string(), expected);
        assert!(request.extensions().get::<RenderingPdf>().is_some());
    }

    #[rstest]
    #[case(None, "text/html")]
    #[case(Some(""), "text/html")]
    #[case(Some("application/json"), "text/html,application/json")]
    #[case(Some("text/plain,*/*;q=0.8"), "text/html,text/plain,*/*;q=0.8")]
    fn test_prefer_html(#[case] accept: Option<&str>, #[case] expected: &str) {
        assert_eq!(prefer_html(accept), expected);
    }

    #[test]
    fn test_accept_header() {
        let mut request = Request::builder().uri("/a.pdf").header(ACCEPT, "application/json").body(()).unwrap();
        rewrite(&mut request);
        assert_eq!(request.headers()[ACCEPT], "text/html,application/json");
    }

    #[test]
    fn test_origin_from_host() {
        let request = Request::builder().uri("/document.pdf").header(HOST, "example.com").body(()).unwrap();
        let origin = Origin::of(&request);
        assert_eq!(origin.root_url.as_deref(), Some("http://example.com/"));
        assert_eq!(origin.protocol, "http");
    }

    #[test]
    fn test_origin_from_uri() {
        let origin = Origin::of(&request("https://example.com:8443/document.pdf"));
        assert_eq!(origin.root_url.as_deref(), Some("https://example.com:8443/"));
        assert_eq!(origin.protocol, "https");
    }

    #[test]
    fn test_origin_without_host() {
        let origin = Origin::of(&request("/document.pdf"));
        assert_eq!(origin.root_url, None);
        assert_eq!(origin.protocol, "http");
    }
}
