use crate::error::{ErrorKind, Result};
use crate::invoke::Invocation;
use crate::options::{self, NormalizedOptions, Options, Value};
use crate::settings::merge;
use crate::source::Source;
use crate::style::Stylesheets;
use crate::{Converter, TempFile, meta, preprocess};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

/// Where a rendered PDF ended up.
#[derive(Debug)]
pub enum Output {
    /// A caller-chosen path.
    Persisted(PathBuf),
    /// A temporary file, deleted when dropped.
    Temporary(TempFile),
}
impl Output {
    pub fn path(&self) -> &Path {
        match self {
            Self::Persisted(path) => path,
            Self::Temporary(file) => file.path(),
        }
    }
}

/// Options after merging, with the keys that steer preprocessing pulled out.
struct Plan {
    options: NormalizedOptions,
    root_url: Option<String>,
    protocol: Option<String>,
}

/// One conversion: a source plus its options and stylesheets.
///
/// Created by [`Converter::document`]. Nothing runs until one of the `to_*`
/// methods is called, and each call spawns a fresh wkhtmltopdf process.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    converter: &'a Converter,
    source: Source,
    options: Options,
    stylesheets: Stylesheets,
    timeout: Option<Duration>,
}
impl<'a> Document<'a> {
    pub(crate) fn new(converter: &'a Converter, source: Source) -> Self {
        Self {
            converter,
            source,
            options: Options::new(),
            stylesheets: Stylesheets::new(),
            timeout: converter.settings().timeout(),
        }
    }

    /// Merges options over the configured defaults. `root_url` and `protocol`
    /// are not passed to wkhtmltopdf; they control link rewriting instead.
    pub fn with_options(mut self, options: Options) -> Self {
        merge(&mut self.options, options);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        merge(&mut self.options, Options::from_iter([(key.into(), value.into())]));
        self
    }

    /// Inlines the stylesheet at `path`. Only HTML sources accept stylesheets.
    pub fn with_stylesheet(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.ensure_styleable()?;
        self.stylesheets = self.stylesheets.with_file(path)?;
        Ok(self)
    }

    /// Inlines raw CSS. Only HTML sources accept stylesheets.
    pub fn with_style(mut self, css: impl Into<String>) -> Result<Self> {
        self.ensure_styleable()?;
        self.stylesheets = self.stylesheets.with_content(css);
        Ok(self)
    }

    /// Overrides the configured timeout for this conversion.
    pub fn with_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn stylesheets(&self) -> &Stylesheets {
        &self.stylesheets
    }

    /// The flags wkhtmltopdf will receive.
    pub fn options(&self) -> NormalizedOptions {
        self.plan().options
    }

    /// The source as it will be handed to wkhtmltopdf: HTML sources get their
    /// links absolutized and stylesheets inlined.
    pub fn prepared_source(&self) -> Result<Source> {
        self.prepare(&self.plan())
    }

    /// Builds the command without running it. `None` writes to stdout.
    pub fn command(&self, destination: Option<&Path>) -> Result<Invocation> {
        let plan = self.plan();
        let source = self.prepare(&plan)?;
        self.invocation(plan.options, source, destination)
    }

    /// Renders to memory.
    #[instrument(skip(self), fields(source = self.kind()))]
    pub fn to_pdf(&self) -> Result<Vec<u8>> {
        let pdf = self.command(None)?.run(self.timeout)?;
        tracing::info!(size = pdf.len(), "Rendered PDF");
        Ok(pdf)
    }

    /// Renders straight to `path`, which wkhtmltopdf creates or truncates.
    #[instrument(skip(self, path), fields(source = self.kind(), path = %path.as_ref().display()))]
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<Output> {
        let path = std::path::absolute(path.as_ref()).or_raise(|| ErrorKind::Io)?;
        self.command(Some(&path))?.run(self.timeout)?;
        tracing::info!("Rendered PDF to file");
        Ok(Output::Persisted(path))
    }

    /// Renders to a temporary file that is removed when the output is dropped.
    pub fn to_temp(&self) -> Result<Output> {
        let file = tempfile::Builder::new().suffix(".pdf").tempfile().or_raise(|| ErrorKind::Io)?;
        self.command(Some(file.path()))?.run(self.timeout)?;
        Ok(Output::Temporary(file))
    }

    fn plan(&self) -> Plan {
        let settings = self.converter.settings();
        let mut merged = settings.default_options.clone();
        merge(&mut merged, self.options.clone());
        if settings.verbose {
            options::take(&mut merged, "quiet");
        }
        if let Some(html) = self.source.html() {
            merge(&mut merged, meta::find_options(html, &settings.meta_tag_prefix));
        }
        let root_url = options::take(&mut merged, "root-url")
            .filter(|v| !v.is_falsy())
            .map(|v| v.to_string())
            .or_else(|| settings.root_url.clone());
        let protocol = options::take(&mut merged, "protocol").filter(|v| !v.is_falsy()).map(|v| v.to_string());
        Plan { options: options::normalize(&merged), root_url, protocol }
    }

    fn prepare(&self, plan: &Plan) -> Result<Source> {
        // Stylesheets are rejected on attach, so non-HTML sources pass through untouched.
        let Some(html) = self.source.html() else {
            return Ok(self.source.clone());
        };
        let html = preprocess::process(html, plan.root_url.as_deref(), plan.protocol.as_deref());
        Ok(Source::Html(self.stylesheets.inject(&html)))
    }

    fn invocation(&self, options: NormalizedOptions, source: Source, destination: Option<&Path>) -> Result<Invocation> {
        let accepted = if options.is_lenient() { self.converter.settings().lenient_exit_codes.clone() } else { Vec::new() };
        let input = source.to_input_for_command()?;
        let invocation = Invocation::new(
            self.converter.executable().clone(),
            options.to_args(),
            input,
            destination.map(Path::to_path_buf),
        )
        .with_accepted_exit_codes(accepted);
        Ok(match source {
            Source::Html(html) => invocation.with_stdin(html),
            _ => invocation,
        })
    }

    fn ensure_styleable(&self) -> Result<()> {
        if !self.source.is_html() {
            exn::bail!(ErrorKind::ImproperSource("stylesheets may only be added to an HTML source".to_string()));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        match self.source {
            Source::Html(_) => "html",
            Source::File(_) => "file",
            Source::Url(_) => "url",
        }
    }
}
