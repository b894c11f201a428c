use regex::Regex;

/// Disposition sent with converted responses unless configured otherwise.
pub const DEFAULT_DISPOSITION: &str = "inline";

/// A path matcher for [`Conditions::only`] and [`Conditions::except`].
#[derive(Debug, Clone)]
pub enum Rule {
    /// Matches paths starting with the string.
    Prefix(String),
    /// Matches paths the expression finds a match in.
    Pattern(Regex),
}
impl Rule {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Pattern(regex) => regex.is_match(path),
        }
    }
}
impl From<&str> for Rule {
    fn from(prefix: &str) -> Self {
        Self::Prefix(prefix.to_string())
    }
}
impl From<String> for Rule {
    fn from(prefix: String) -> Self {
        Self::Prefix(prefix)
    }
}
impl From<Regex> for Rule {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

/// Which `.pdf` requests are converted, and how their responses are treated.
#[derive(Debug, Clone)]
pub struct Conditions {
    only: Vec<Rule>,
    except: Vec<Rule>,
    caching: bool,
    disposition: String,
}
impl Default for Conditions {
    fn default() -> Self {
        Self { only: Vec::new(), except: Vec::new(), caching: false, disposition: DEFAULT_DISPOSITION.to_string() }
    }
}
impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only convert paths matching at least one of these rules.
    pub fn only<R: Into<Rule>>(mut self, rules: impl IntoIterator<Item = R>) -> Self {
        self.only.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Never convert paths matching any of these rules.
    pub fn except<R: Into<Rule>>(mut self, rules: impl IntoIterator<Item = R>) -> Self {
        self.except.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Keep `ETag` and `Cache-Control` on converted responses.
    pub fn caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    /// `Content-Disposition` for converted responses, e.g. `attachment; filename=report.pdf`.
    pub fn disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = disposition.into();
        self
    }

    pub fn is_caching(&self) -> bool {
        self.caching
    }

    pub fn default_disposition(&self) -> &str {
        &self.disposition
    }

    /// Whether a request for `path` should be answered with a PDF.
    pub fn should_render(&self, path: &str) -> bool {
        if !path.ends_with(".pdf") {
            return false;
        }
        if !self.only.is_empty() && !self.only.iter().any(|rule| rule.matches(path)) {
            return false;
        }
        !self.except.iter().any(|rule| rule.matches(path))
    }
}
