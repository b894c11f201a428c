//! HTML to PDF conversion through wkhtmltopdf.
//!
//! ```no_run
//! use pagekit_render::{Converter, Settings};
//!
//! let converter = Converter::new(Settings::default())?;
//! let pdf = converter
//!     .document("<h1>Oh Hai</h1>")
//!     .with_option("page_size", "A4")
//!     .to_pdf()?;
//! assert!(pdf.starts_with(b"%PDF"));
//! # Ok::<(), pagekit_render::Error>(())
//! ```

mod consts;
pub mod error;
pub mod executable;
pub mod invoke;
pub mod meta;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod options;
pub mod os;
pub mod preprocess;
mod render;
mod settings;
pub mod source;
mod style;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::executable::Executable;
pub use crate::invoke::Invocation;
pub use crate::options::{NormalizedOptions, Options, Value};
pub use crate::render::{Document, Output};
pub use crate::settings::Settings;
pub use crate::source::Source;
pub use crate::style::Stylesheets;

pub type TempFile = tempfile::NamedTempFile;

/// Converts documents with one wkhtmltopdf executable and one set of settings.
///
/// Cheap to share between threads; every conversion spawns its own process.
#[derive(Debug, Clone)]
pub struct Converter {
    executable: Executable,
    settings: Settings,
}
impl Converter {
    /// Resolves the executable described by `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        Ok(Self { executable: Executable::resolve(&settings)?, settings })
    }

    /// Uses `executable` as-is, skipping discovery.
    pub fn with_executable(settings: Settings, executable: Executable) -> Self {
        Self { executable, settings }
    }

    pub fn document(&self, source: impl Into<Source>) -> Document<'_> {
        Document::new(self, source.into())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }
}
impl TryFrom<Settings> for Converter {
    type Error = Error;
    fn try_from(settings: Settings) -> std::result::Result<Self, Self::Error> {
        Converter::new(settings)
    }
}
