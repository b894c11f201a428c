//! Option normalization for wkhtmltopdf.
//!
//! Callers describe a conversion with a loosely-typed [`Options`] map (it may
//! come from code, a config file, `<meta>` tags or a JSON header). This module
//! turns that map into [`NormalizedOptions`]: an ordered set of command-line
//! flags with their value tokens, ready to be spliced into an argv.
//!
//! The rules, in order:
//!
//! - Keys are lowercased and every character outside `[a-z0-9]` becomes `-`.
//!   They are then prefixed with `--`, except for the [special](SPECIAL_OPTIONS)
//!   sub-document markers `cover` and `toc`.
//! - Falsy values (`null`, `false`, `""`, `[]`, `{}`) drop the flag, although
//!   special options survive empty values as presence-only flags.
//! - `true` (or the string `"true"`) is a presence-only flag.
//! - Maps flatten into `k1 v1 k2 v2 …`, lists flatten into their elements, and
//!   scalars are stringified.
//! - [Repeatable](REPEATABLE_OPTIONS) flags get one occurrence per sub-key,
//!   so `{cookie: {a: 1, b: 2}}` becomes `--cookie a 1 --cookie b 2`.
//!
//! Normalization never fails. Insertion order is preserved, and a later key
//! that normalizes to an existing flag replaces its value in place.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Flags that wkhtmltopdf accepts more than once, each with its own sub-key.
///
/// Pulled from wkhtmltopdf's usage documentation.
pub const REPEATABLE_OPTIONS: [&str; 8] = [
    "--allow",
    "--bypass-proxy-for",
    "--cookie",
    "--custom-header",
    "--post",
    "--post-file",
    "--run-script",
    "--replace",
];
/// Sub-document markers which are positional words rather than `--` flags.
pub const SPECIAL_OPTIONS: [&str; 2] = ["cover", "toc"];

/// Caller-facing conversion options, in insertion order.
pub type Options = IndexMap<String, Value>;

/// A single option value.
///
/// Deserializes from any self-describing format (TOML, JSON, environment
/// variables via figment) without a type tag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}
impl Value {
    /// `null`, `false`, and empty strings, lists and maps.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Null | Self::Bool(false) => true,
            Self::Text(s) => s.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Map(m) => m.is_empty(),
            Self::Bool(true) | Self::Integer(_) | Self::Float(_) => false,
        }
    }

    fn is_true(&self) -> bool {
        matches!(self, Self::Bool(true)) || matches!(self, Self::Text(s) if s == "true")
    }
}
impl Display for Value {
    /// Canonical stringification. Containers flatten to space-separated tokens.
    ///
    /// Whole floats print without a fractional part (`12.0` becomes `12`);
    /// wkhtmltopdf parses both forms the same way.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::List(_) | Self::Map(_) => {
                let mut tokens = Vec::new();
                stringify_into(self, &mut tokens);
                f.write_str(&tokens.join(" "))
            },
        }
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )+
    };
}
value_from!(Bool: bool);
value_from!(Integer: i8, i16, i32, i64, u8, u16, u32);
value_from!(Float: f32, f64);
value_from!(Text: &str, String);
value_from!(Map: IndexMap<String, Value>);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Lowercases an option name and replaces everything outside `[a-z0-9]` with `-`.
///
/// ```
/// use pagekit_render::options::normalize_key;
/// assert_eq!(normalize_key("Margin_Top"), "margin-top");
/// assert_eq!(normalize_key("toc_l1 font.size"), "toc-l1-font-size");
/// ```
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect()
}

/// Removes (and returns) the last entry whose key normalizes to `name`.
///
/// Every matching entry is removed, so `root_url` and `root-url` cannot
/// both linger in the map.
pub fn take(options: &mut Options, name: &str) -> Option<Value> {
    let mut taken = None;
    options.retain(|key, value| {
        if normalize_key(key) == name {
            taken = Some(std::mem::take(value));
            false
        } else {
            true
        }
    });
    taken
}

/// One occurrence of a flag in the final command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// A flag that appears at most once, e.g. `--page-size`.
    Single(String),
    /// One occurrence of a repeatable flag, keyed by its sub-key, e.g.
    /// `--cookie session`.
    Repeated(String, String),
}
impl Flag {
    pub fn name(&self) -> &str {
        match self {
            Self::Single(name) | Self::Repeated(name, _) => name,
        }
    }
}

/// The result of [`normalize`]: flags in command order with their value tokens.
///
/// An empty token list means a presence-only flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedOptions {
    flags: IndexMap<Flag, Vec<String>>,
}
impl NormalizedOptions {
    /// Value tokens of a singular flag, e.g. `get("--page-size")`.
    pub fn get(&self, flag: &str) -> Option<&[String]> {
        self.flags.get(&Flag::Single(flag.to_string())).map(Vec::as_slice)
    }

    /// Value tokens of one occurrence of a repeatable flag.
    pub fn get_repeated(&self, flag: &str, key: &str) -> Option<&[String]> {
        self.flags.get(&Flag::Repeated(flag.to_string(), key.to_string())).map(Vec::as_slice)
    }

    /// Whether any occurrence of `flag` is present.
    pub fn contains(&self, flag: &str) -> bool {
        self.flags.keys().any(|f| f.name() == flag)
    }

    /// Removes a singular flag, returning its value tokens.
    pub fn remove(&mut self, flag: &str) -> Option<Vec<String>> {
        self.flags.shift_remove(&Flag::Single(flag.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Flag, &[String])> {
        self.flags.iter().map(|(flag, values)| (flag, values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Whether wkhtmltopdf was asked to tolerate missing assets.
    ///
    /// `--load-error-handling` replaced `--ignore-load-errors` in wkhtmltopdf
    /// 0.10.0 beta4; both are honoured.
    pub fn is_lenient(&self) -> bool {
        self.contains("--ignore-load-errors")
            || self
                .get("--load-error-handling")
                .is_some_and(|v| matches!(v, [mode] if mode == "skip" || mode == "ignore"))
    }

    /// Flattens into argv tokens: `flag [sub-key] [values…]` per occurrence.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.flags.len() * 2);
        for (flag, values) in &self.flags {
            match flag {
                Flag::Single(name) => args.push(name.clone()),
                Flag::Repeated(name, key) => args.extend([name.clone(), key.clone()]),
            }
            args.extend(values.iter().cloned());
        }
        args
    }

    fn insert(&mut self, flag: Flag, values: Vec<String>) {
        self.flags.insert(flag, values);
    }
}

/// Normalizes caller options into command-line flags. See the module docs.
pub fn normalize(options: &Options) -> NormalizedOptions {
    let mut normalized = NormalizedOptions::default();
    for (key, value) in options {
        let name = normalize_key(key);
        let special = SPECIAL_OPTIONS.contains(&name.as_str());
        if value.is_falsy() {
            if special && !matches!(value, Value::Null | Value::Bool(false)) {
                normalized.insert(Flag::Single(name), Vec::new());
            }
            continue;
        }
        let name = if special { name } else { format!("--{name}") };
        if REPEATABLE_OPTIONS.contains(&name.as_str()) {
            for (sub_key, values) in repeated_values(value) {
                normalized.insert(Flag::Repeated(name.clone(), sub_key), values);
            }
        } else {
            normalized.insert(Flag::Single(name), value_tokens(value));
        }
    }
    normalized
}

/// Value tokens for a singular flag.
fn value_tokens(value: &Value) -> Vec<String> {
    let mut tokens = Vec::new();
    match value {
        Value::List(items) => {
            for item in items {
                stringify_into(item, &mut tokens);
            }
        },
        _ => flatten_into(value, &mut tokens),
    }
    tokens
}

/// Recursive flattening used for maps: presence-only markers (`true`,
/// `"true"`, `null`) vanish instead of becoming tokens.
fn flatten_into(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {},
        v if v.is_true() => {},
        Value::Map(map) => {
            for (k, v) in map {
                out.push(k.clone());
                flatten_into(v, out);
            }
        },
        Value::List(items) => items.iter().for_each(|item| flatten_into(item, out)),
        scalar => out.push(scalar.to_string()),
    }
}

/// Plain stringification used for lists: every element becomes a token.
fn stringify_into(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::List(items) => items.iter().for_each(|item| stringify_into(item, out)),
        Value::Map(map) => {
            for (k, v) in map {
                out.push(k.clone());
                stringify_into(v, out);
            }
        },
        scalar => out.push(scalar.to_string()),
    }
}

/// Splits a repeatable option's value into `(sub-key, value tokens)` pairs.
fn repeated_values(value: &Value) -> Vec<(String, Vec<String>)> {
    match value {
        Value::Map(map) => map.iter().map(|(k, v)| (k.clone(), value_tokens(v))).collect(),
        Value::List(items) => items
            .iter()
            .flat_map(|item| match item {
                // `[[name, value], …]` tuples.
                Value::List(pair) => match pair.as_slice() {
                    [] => Vec::new(),
                    [key] => vec![(key.to_string(), Vec::new())],
                    [key, value, ..] => vec![(key.to_string(), value_tokens(value))],
                },
                Value::Map(_) => repeated_values(item),
                scalar => vec![(scalar.to_string(), Vec::new())],
            })
            .collect(),
        scalar => vec![(scalar.to_string(), Vec::new())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn options<const N: usize>(entries: [(&str, Value); N]) -> Options {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case("page_size", "page-size")]
    #[case("PAGE-SIZE", "page-size")]
    #[case("toc_l1_font_size", "toc-l1-font-size")]
    #[case("margin top", "margin-top")]
    #[case("Captación", "captaci-n")]
    fn test_normalize_key(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_key(input), expected);
    }

    #[test]
    fn test_prefixes_flags() {
        let n = normalize(&options([("page_size", "Letter".into())]));
        assert_eq!(n.get("--page-size"), Some(&strings(&["Letter"])[..]));
    }

    #[rstest]
    #[case(Value::Null)]
    #[case(Value::Bool(false))]
    #[case(Value::Text(String::new()))]
    #[case(Value::List(vec![]))]
    #[case(Value::Map(IndexMap::new()))]
    fn test_drops_falsy_values(#[case] value: Value) {
        let n = normalize(&options([("disable_smart_shrinking", value)]));
        assert!(!n.contains("--disable-smart-shrinking"));
        assert!(n.is_empty());
    }

    #[rstest]
    #[case(Value::Bool(true))]
    #[case(Value::Text("true".into()))]
    fn test_true_is_presence_only(#[case] value: Value) {
        let n = normalize(&options([("disable_smart_shrinking", value)]));
        assert_eq!(n.get("--disable-smart-shrinking"), Some(&[][..]));
        assert_eq!(n.to_args(), strings(&["--disable-smart-shrinking"]));
    }

    #[rstest]
    #[case(Value::Integer(300), "300")]
    #[case(Value::Float(0.5), "0.5")]
    #[case(Value::Float(12.0), "12")]
    #[case(Value::Bool(true), "true")]
    #[case(Value::Text("A4".into()), "A4")]
    fn test_stringifies_scalars(#[case] value: Value, #[case] expected: &str) {
        // Bool(true) on its own is presence-only; inside a list it's a token.
        let n = normalize(&options([("image_dpi", Value::List(vec![value]))]));
        assert_eq!(n.get("--image-dpi"), Some(&strings(&[expected])[..]));
    }

    #[test]
    fn test_maps_flatten_into_pairs() {
        let value: Value = [("value", "something else")].into_iter().collect();
        let n = normalize(&options([("header_left", value)]));
        assert_eq!(n.get("--header-left"), Some(&strings(&["value", "something else"])[..]));
    }

    #[test]
    fn test_nested_maps_flatten_recursively() {
        let inner: Value = [("b", Value::Integer(2)), ("c", Value::Bool(true))].into_iter().collect();
        let value: Value = [("a", inner)].into_iter().collect();
        let n = normalize(&options([("replace", Value::Null), ("header_left", value)]));
        assert_eq!(n.get("--header-left"), Some(&strings(&["a", "b", "2", "c"])[..]));
    }

    #[test]
    fn test_lists_flatten() {
        let n = normalize(&options([("header_left", vec!["value", "something else"].into())]));
        assert_eq!(n.get("--header-left"), Some(&strings(&["value", "something else"])[..]));
    }

    #[test]
    fn test_repeatable_map() {
        let value: Value = [("a", 1), ("b", 2)].into_iter().collect();
        let n = normalize(&options([("cookie", value)]));
        assert!(n.get("--cookie").is_none());
        assert_eq!(n.get_repeated("--cookie", "a"), Some(&strings(&["1"])[..]));
        assert_eq!(n.get_repeated("--cookie", "b"), Some(&strings(&["2"])[..]));
        assert_eq!(n.to_args(), strings(&["--cookie", "a", "1", "--cookie", "b", "2"]));
    }

    #[test]
    fn test_repeatable_list_of_tuples() {
        let value = Value::List(vec![vec!["cookie_name1", "cookie_val1"].into(), vec!["cookie_name2", "cookie_val2"].into()]);
        let n = normalize(&options([("cookie", value)]));
        assert_eq!(
            n.to_args(),
            strings(&["--cookie", "cookie_name1", "cookie_val1", "--cookie", "cookie_name2", "cookie_val2"])
        );
    }

    #[test]
    fn test_repeatable_scalar() {
        let n = normalize(&options([("allow", "http://myapp.com".into())]));
        assert_eq!(n.get_repeated("--allow", "http://myapp.com"), Some(&[][..]));
    }

    #[test]
    fn test_repeatable_list_and_null_map_values() {
        let list = normalize(&options([("allow", vec!["http://myapp.com", "http://google.com"].into())]));
        let map: Value = [("http://myapp.com", Value::Null), ("http://google.com", Value::Null)].into_iter().collect();
        let map = normalize(&options([("allow", map)]));
        for n in [list, map] {
            assert_eq!(n.get_repeated("--allow", "http://myapp.com"), Some(&[][..]));
            assert_eq!(n.get_repeated("--allow", "http://google.com"), Some(&[][..]));
            assert_eq!(n.len(), 2);
        }
    }

    #[test]
    fn test_special_options_are_not_prefixed() {
        let n = normalize(&options([("cover", "x.html".into()), ("toc", "".into())]));
        assert_eq!(n.to_args(), strings(&["cover", "x.html", "toc"]));
        assert!(!n.contains("--cover"));
    }

    #[test]
    fn test_special_options_drop_on_false() {
        let n = normalize(&options([("toc", false.into()), ("cover", Value::Null)]));
        assert!(n.is_empty());
    }

    #[test]
    fn test_preserves_insertion_order_and_last_value_wins() {
        let n = normalize(&options([
            ("page_size", "Letter".into()),
            ("quiet", true.into()),
            ("Page-Size", "A4".into()),
        ]));
        assert_eq!(n.to_args(), strings(&["--page-size", "A4", "--quiet"]));
    }

    #[test]
    fn test_arguments_are_never_split() {
        let n = normalize(&options([("header_center", "foo [page]".into()), ("title", "$(ls)".into())]));
        assert_eq!(n.to_args(), strings(&["--header-center", "foo [page]", "--title", "$(ls)"]));
    }

    #[rstest]
    #[case(options([("ignore_load_errors", true.into())]), true)]
    #[case(options([("load_error_handling", "skip".into())]), true)]
    #[case(options([("load_error_handling", "ignore".into())]), true)]
    #[case(options([("load_error_handling", "abort".into())]), false)]
    #[case(options([("quiet", true.into())]), false)]
    fn test_is_lenient(#[case] input: Options, #[case] expected: bool) {
        assert_eq!(normalize(&input).is_lenient(), expected);
    }

    #[test]
    fn test_take_matches_normalized_keys() {
        let mut opts = options([("root_url", "http://a/".into()), ("quiet", true.into()), ("Root-URL", "http://b/".into())]);
        assert_eq!(take(&mut opts, "root-url"), Some(Value::Text("http://b/".into())));
        assert_eq!(opts.len(), 1);
        assert_eq!(take(&mut opts, "protocol"), None);
    }

    #[test]
    fn test_value_deserializes_untagged() {
        let opts: Options = serde_json::from_str(
            r#"{"page_size": "A4", "quiet": true, "dpi": 300, "zoom": 1.5, "cookie": {"a": "1"}, "allow": ["x"], "toc": null}"#,
        )
        .unwrap();
        assert_eq!(opts["page_size"], Value::Text("A4".into()));
        assert_eq!(opts["quiet"], Value::Bool(true));
        assert_eq!(opts["dpi"], Value::Integer(300));
        assert_eq!(opts["zoom"], Value::Float(1.5));
        assert!(matches!(opts["cookie"], Value::Map(_)));
        assert!(matches!(opts["allow"], Value::List(_)));
        assert_eq!(opts["toc"], Value::Null);
    }
}
