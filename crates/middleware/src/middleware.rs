use crate::conditions::Conditions;
use crate::error::Error;
use crate::request::{self, Origin};
use http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use pagekit_render::options::normalize_key;
use pagekit_render::{Converter, Options, Value};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::instrument;

/// Response header naming a path the PDF should also be written to.
pub const SAVE_PDF_HEADER: HeaderName = HeaderName::from_static("pagekit-save-pdf");
/// Response header carrying wkhtmltopdf's `javascript_delay`, in milliseconds.
pub const JAVASCRIPT_DELAY_HEADER: HeaderName = HeaderName::from_static("pagekit-javascript-delay");
/// Response header carrying JSON [`Overrides`] for this one conversion.
pub const OPTIONS_HEADER: HeaderName = HeaderName::from_static("pagekit-options");

static HTML_CONTENT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)text/html|application/xhtml\+xml").unwrap());

/// Something that turns a request into a response: the application the
/// middleware wraps.
///
/// Implemented for closures, and for [`Middleware`] itself so layers stack.
pub trait Handler {
    type Error;
    fn call(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, Self::Error>;
}
impl<F, E> Handler for F
where
    F: Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, E>,
{
    type Error = E;
    fn call(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, E> {
        self(request)
    }
}

/// Per-conversion settings a handler can send back in [`OPTIONS_HEADER`].
///
/// ```json
/// {"options": {"orientation": "Landscape"}, "disposition": "attachment"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub options: Options,
    pub disposition: Option<String>,
}

/// Serves `<path>.pdf` by asking the wrapped handler for `<path>` as HTML
/// and converting the response.
///
/// The middleware holds configuration only. Everything decided about a
/// request lives on the stack of [`call`](Handler::call), so one instance
/// can serve any number of threads at once.
#[derive(Debug, Clone)]
pub struct Middleware<H> {
    inner: H,
    converter: Converter,
    options: Options,
    conditions: Conditions,
}
impl<H: Handler> Middleware<H> {
    pub fn new(inner: H, converter: Converter) -> Self {
        Self { inner, converter, options: Options::new(), conditions: Conditions::default() }
    }

    /// Options passed to every conversion, over the converter's defaults.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn into_inner(self) -> H {
        self.inner
    }

    fn convert(&self, response: &mut Response<Vec<u8>>, origin: Origin) -> Result<(), pagekit_render::Error> {
        let headers = response.headers_mut();
        let save_to = take_header(headers, &SAVE_PDF_HEADER);
        let delay = take_header(headers, &JAVASCRIPT_DELAY_HEADER);
        let overrides = take_header(headers, &OPTIONS_HEADER).and_then(|json| parse_overrides(&json)).unwrap_or_default();

        // Request-derived link rewriting only fills in what is not configured.
        let mut options = self.options.clone();
        let configured = |name: &str| options.keys().any(|key| normalize_key(key) == name);
        let (has_root_url, has_protocol) = (configured("root-url"), configured("protocol"));
        if self.converter.settings().root_url.is_none()
            && !has_root_url
            && let Some(root_url) = origin.root_url
        {
            options.insert("root_url".to_string(), Value::from(root_url));
        }
        if !has_protocol {
            options.insert("protocol".to_string(), Value::from(origin.protocol));
        }
        if let Some(delay) = delay {
            options.insert("javascript_delay".to_string(), Value::from(parse_delay(&delay)));
        }

        let html = String::from_utf8_lossy(response.body()).into_owned();
        let pdf = self.converter.document(html).with_options(options).with_options(overrides.options).to_pdf()?;

        if let Some(path) = save_to {
            // Best effort: the response is what matters.
            match std::fs::write(&path, &pdf) {
                Ok(()) => tracing::debug!(path = %path, "Saved rendered PDF"),
                Err(e) => tracing::warn!(path = %path, error = %e, "Could not save rendered PDF"),
            }
        }

        let headers = response.headers_mut();
        if !self.conditions.is_caching() {
            headers.remove(ETAG);
            headers.remove(CACHE_CONTROL);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(pdf.len()));
        if !headers.contains_key(CONTENT_DISPOSITION) {
            let disposition = overrides.disposition.as_deref().unwrap_or(self.conditions.default_disposition());
            match HeaderValue::from_str(disposition) {
                Ok(value) => {
                    headers.insert(CONTENT_DISPOSITION, value);
                },
                Err(e) => tracing::warn!(disposition, error = %e, "Ignoring invalid Content-Disposition"),
            }
        }
        *response.body_mut() = pdf;
        Ok(())
    }
}
impl<H: Handler> Handler for Middleware<H> {
    type Error = Error<H::Error>;

    #[instrument(skip_all, fields(method = %request.method(), path = request.uri().path()))]
    fn call(&self, mut request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, Self::Error> {
        if !self.conditions.should_render(request.uri().path()) {
            return self.inner.call(request).map_err(Error::Upstream);
        }
        let origin = Origin::of(&request);
        request::rewrite(&mut request);
        tracing::debug!(path = request.uri().path(), "Requesting HTML for PDF conversion");

        let mut response = self.inner.call(request).map_err(Error::Upstream)?;
        if !is_html(response.headers()) {
            tracing::debug!(content_type = ?response.headers().get(CONTENT_TYPE), "Response is not HTML; passing through");
            return Ok(response);
        }
        self.convert(&mut response, origin).map_err(Error::Render)?;
        Ok(response)
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| HTML_CONTENT_TYPE.is_match(value))
}

/// Removes a side-channel header, returning its value if it was readable.
fn take_header(headers: &mut HeaderMap, name: &HeaderName) -> Option<String> {
    let value = headers.remove(name)?;
    match value.to_str() {
        Ok(value) => Some(value.trim().to_string()),
        Err(e) => {
            tracing::warn!(header = %name, error = %e, "Ignoring non-ASCII header");
            None
        },
    }
}

/// Unparsable delays become 0 rather than failing the conversion.
fn parse_delay(value: &str) -> i64 {
    value.parse().unwrap_or_else(|_| {
        tracing::warn!(value, "Invalid javascript delay; using 0");
        0
    })
}

fn parse_overrides(json: &str) -> Option<Overrides> {
    match serde_json::from_str(json) {
        Ok(overrides) => Some(overrides),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid conversion overrides");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("text/html", true)]
    #[case("text/html; charset=utf-8", true)]
    #[case("Text/HTML", true)]
    #[case("application/xhtml+xml", true)]
    #[case("application/json", false)]
    #[case("text/plain", false)]
    fn test_is_html(#[case] content_type: &str, #[case] expected: bool) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        assert_eq!(is_html(&headers), expected);
    }

    #[test]
    fn test_missing_content_type_is_not_html() {
        assert!(!is_html(&HeaderMap::new()));
    }

    #[rstest]
    #[case("4321", 4321)]
    #[case("invalid", 0)]
    #[case("", 0)]
    #[case("-5", -5)]
    fn test_parse_delay(#[case] value: &str, #[case] expected: i64) {
        assert_eq!(parse_delay(value), expected);
    }

    #[test]
    fn test_parse_overrides() {
        let overrides = parse_overrides(r#"{"options": {"orientation": "Landscape"}, "disposition": "attachment"}"#).unwrap();
        assert_eq!(overrides.options["orientation"], Value::from("Landscape"));
        assert_eq!(overrides.disposition.as_deref(), Some("attachment"));
        assert_eq!(parse_overrides("{}"), Some(Overrides::default()));
        assert_eq!(parse_overrides("not json"), None);
        assert_eq!(parse_overrides(r#"{"unknown": 1}"#), None);
    }

    #[test]
    fn test_take_header() {
        let mut headers = HeaderMap::new();
        headers.insert(SAVE_PDF_HEADER, HeaderValue::from_static(" /tmp/out.pdf "));
        assert_eq!(take_header(&mut headers, &SAVE_PDF_HEADER).as_deref(), Some("/tmp/out.pdf"));
        assert!(headers.is_empty());
        assert_eq!(take_header(&mut headers, &SAVE_PDF_HEADER), None);
    }
}
