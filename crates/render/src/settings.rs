use crate::options::{Options, Value, normalize_key};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Process-wide conversion settings.
///
/// Built once (usually by `pagekit-config`) and handed to
/// [`Converter::new`](crate::Converter::new); nothing reads settings from a
/// global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the wkhtmltopdf binary. Discovered on `PATH` when unset, or
    /// when the configured path does not exist.
    pub wkhtmltopdf: Option<PathBuf>,
    /// Run wkhtmltopdf under `xvfb-run`, for hosts without a display.
    pub use_xvfb: bool,
    /// Let wkhtmltopdf print progress; drops the `quiet` option.
    pub verbose: bool,
    /// Prefix of `<meta>` names that carry conversion options.
    pub meta_tag_prefix: String,
    /// Base URL used to absolutize host-relative links in HTML sources.
    pub root_url: Option<String>,
    /// Options applied to every conversion, before per-document options.
    pub default_options: Options,
    /// Exit codes accepted as success when wkhtmltopdf was told to ignore
    /// load errors. wkhtmltopdf 0.12 exits with 2 when a sub-resource 404s.
    pub lenient_exit_codes: Vec<i32>,
    /// Seconds before a running conversion is killed. Unset waits forever.
    pub timeout_secs: Option<f64>,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            wkhtmltopdf: None,
            use_xvfb: false,
            verbose: false,
            meta_tag_prefix: "pdfkit-".to_string(),
            root_url: None,
            default_options: default_options(),
            lenient_exit_codes: vec![2],
            timeout_secs: None,
        }
    }
}
impl Settings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Merges options into the defaults instead of replacing them.
    ///
    /// A key that normalizes to an existing default (`page-size` and
    /// `page_size`) overrides it in place; new keys are appended.
    pub fn merge_default_options(&mut self, options: Options) {
        merge(&mut self.default_options, options);
    }
}

/// Merges `overrides` into `base`, matching keys by their normalized form.
pub(crate) fn merge(base: &mut Options, overrides: Options) {
    for (key, value) in overrides {
        let normalized = normalize_key(&key);
        match base.keys().position(|existing| normalize_key(existing) == normalized) {
            Some(index) => {
                if let Some((_, existing)) = base.get_index_mut(index) {
                    *existing = value;
                }
            },
            None => {
                base.insert(key, value);
            },
        }
    }
}

fn default_options() -> Options {
    [
        ("disable_smart_shrinking", Value::Bool(false)),
        ("quiet", Value::Bool(true)),
        ("page_size", Value::from("Letter")),
        ("margin_top", Value::from("0.75in")),
        ("margin_right", Value::from("0.75in")),
        ("margin_bottom", Value::from("0.75in")),
        ("margin_left", Value::from("0.75in")),
        ("encoding", Value::from("UTF-8")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}
