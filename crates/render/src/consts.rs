use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Only meta tags carrying both attributes can be directives.
selector!(META_SELECTOR, "meta[name][content]");
// `href="/path"` but never `href="//host"`; the path after the slash is optional.
regex!(RELATIVE_PATH_REGEX, r#"(href|src)=(['"])/([^/"'][^"']*)?['"]"#);
regex!(RELATIVE_PROTOCOL_REGEX, r#"(href|src)=(['"])//([^"']*)['"]"#);
