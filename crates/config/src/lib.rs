//! Loads [`Settings`] from layered sources. Later layers win:
//!
//! 1. built-in defaults,
//! 2. `config.toml` in the platform configuration directory, if present,
//! 3. an explicitly given TOML, YAML or JSON file,
//! 4. `PAGEKIT_*` environment variables, nested with `__`
//!    (`PAGEKIT_DEFAULT_OPTIONS__PAGE_SIZE=A4`).
//!
//! Tables merge key by key, so a file that sets one default option keeps
//! all the others. Default options keep the order they were written in.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use indexmap::IndexMap;
pub use pagekit_render::Settings;
use pagekit_render::Options;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const ENV_PREFIX: &str = "PAGEKIT_";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
    Json,
}
impl FileFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?.to_ascii_lowercase();
        match extension.as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// A configuration file merged between the defaults and the environment.
#[derive(Debug)]
struct Layer {
    path: PathBuf,
    format: FileFormat,
}

/// Only the key order of `default_options` is read from each file.
#[derive(Default, Deserialize)]
#[serde(default)]
struct OptionKeys {
    default_options: IndexMap<String, IgnoredAny>,
}

/// Loads settings from every layer.
#[instrument]
pub fn load(file: Option<&Path>) -> Result<Settings> {
    extract(&layers(user_config().as_deref(), file)?)
}

/// The per-user configuration file, whether or not it exists.
pub fn user_config() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pagekit").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

fn layers(user_config: Option<&Path>, file: Option<&Path>) -> Result<Vec<Layer>> {
    let mut layers = Vec::new();
    if let Some(path) = user_config.filter(|path| path.is_file()) {
        layers.push(Layer { path: path.to_path_buf(), format: FileFormat::Toml });
    }
    if let Some(path) = file {
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.display().to_string()));
        }
        let Some(format) = FileFormat::from_path(path) else {
            exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string()));
        };
        layers.push(Layer { path: path.to_path_buf(), format });
    }
    Ok(layers)
}

fn figment(layers: &[Layer]) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Settings::default()));
    for layer in layers {
        tracing::debug!(path = %layer.path.display(), format = ?layer.format, "Merging configuration file");
        figment = match layer.format {
            FileFormat::Toml => figment.merge(Toml::file(&layer.path)),
            FileFormat::Yaml => figment.merge(Yaml::file(&layer.path)),
            FileFormat::Json => figment.merge(Json::file(&layer.path)),
        };
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

fn extract(layers: &[Layer]) -> Result<Settings> {
    let mut settings: Settings = figment(layers).extract().or_raise(|| ErrorKind::Invalid)?;
    settings.default_options = ordered(settings.default_options, &option_order(layers)?);
    tracing::trace!(?settings, "Configuration loaded");
    Ok(settings)
}

/// Default option keys in the order they were written: built-in defaults
/// first, then each file's new keys in file order.
fn option_order(layers: &[Layer]) -> Result<Vec<String>> {
    let mut order: Vec<String> = Settings::default().default_options.into_keys().collect();
    for layer in layers {
        let text = std::fs::read_to_string(&layer.path).or_raise(|| ErrorKind::Invalid)?;
        if text.trim().is_empty() {
            continue;
        }
        let keys: OptionKeys = match layer.format {
            FileFormat::Toml => toml::from_str(&text).or_raise(|| ErrorKind::Invalid)?,
            FileFormat::Yaml => serde_yaml::from_str(&text).or_raise(|| ErrorKind::Invalid)?,
            FileFormat::Json => serde_json::from_str(&text).or_raise(|| ErrorKind::Invalid)?,
        };
        for key in keys.default_options.into_keys() {
            if !order.contains(&key) {
                order.push(key);
            }
        }
    }
    Ok(order)
}

/// Flag order matters to wkhtmltopdf (`toc`, `cover` and `page` start new
/// sections), but the merged table comes back sorted. Keys not named in
/// `order`, such as ones only set through the environment, go last.
fn ordered(mut options: Options, order: &[String]) -> Options {
    let mut out = Options::with_capacity(options.len());
    for key in order {
        if let Some((key, value)) = options.shift_remove_entry(key) {
            out.insert(key, value);
        }
    }
    out.extend(options);
    out
}
