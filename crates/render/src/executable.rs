use crate::error::{ErrorKind, Result};
use crate::settings::Settings;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const WKHTMLTOPDF: &str = "wkhtmltopdf";
const XVFB_RUN: &str = "xvfb-run";

/// `PATH` lookups are done at most once per process, even when several
/// threads race on first use.
static DISCOVERED: OnceLock<Option<PathBuf>> = OnceLock::new();

/// The program to spawn, plus any arguments that precede wkhtmltopdf's own.
///
/// Usually just the wkhtmltopdf binary. Under `xvfb-run` the program is the
/// wrapper and wkhtmltopdf becomes its first argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    program: PathBuf,
    leading: Vec<OsString>,
}
impl Executable {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), leading: Vec::new() }
    }

    /// Inserts `arg` between the program and wkhtmltopdf's flags.
    pub fn with_leading_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading.push(arg.into());
        self
    }

    /// Locates wkhtmltopdf according to `settings`.
    ///
    /// A configured path that does not exist is reported and ignored in
    /// favour of `PATH` discovery.
    pub fn resolve(settings: &Settings) -> Result<Self> {
        let binary = match settings.wkhtmltopdf.as_deref() {
            Some(path) if path.exists() => path.to_path_buf(),
            Some(path) => {
                let fallback = discover()?;
                tracing::warn!(
                    configured = %path.display(),
                    fallback = %fallback.display(),
                    "No executable found at configured path; falling back to discovered wkhtmltopdf"
                );
                fallback
            },
            None => discover()?,
        };
        if !settings.use_xvfb {
            return Ok(Self::new(binary));
        }
        let wrapper = which::which(XVFB_RUN).unwrap_or_else(|_| {
            tracing::info!("xvfb-run not found in PATH; relying on the spawn to locate it");
            PathBuf::from(XVFB_RUN)
        });
        Ok(Self::new(wrapper).with_leading_arg(binary))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn leading_args(&self) -> &[OsString] {
        &self.leading
    }

    /// Program followed by the leading arguments.
    pub fn argv(&self) -> impl Iterator<Item = &OsStr> {
        std::iter::once(self.program.as_os_str()).chain(self.leading.iter().map(OsString::as_os_str))
    }
}

fn discover() -> Result<PathBuf> {
    let discovered = DISCOVERED.get_or_init(|| match which::which(WKHTMLTOPDF) {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Discovered wkhtmltopdf");
            Some(path)
        },
        Err(_) => {
            tracing::info!("wkhtmltopdf executable not found in PATH");
            None
        },
    });
    match discovered {
        Some(path) => Ok(path.clone()),
        None => exn::bail!(ErrorKind::NoExecutable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_path_wins() {
        let binary = tempfile::NamedTempFile::new().unwrap();
        let settings = Settings { wkhtmltopdf: Some(binary.path().to_path_buf()), ..Settings::default() };
        let executable = Executable::resolve(&settings).unwrap();
        assert_eq!(executable.program(), binary.path());
        assert!(executable.leading_args().is_empty());
    }

    #[test]
    fn test_xvfb_wraps_binary() {
        let binary = tempfile::NamedTempFile::new().unwrap();
        let settings = Settings { wkhtmltopdf: Some(binary.path().to_path_buf()), use_xvfb: true, ..Settings::default() };
        let executable = Executable::resolve(&settings).unwrap();
        assert!(executable.program().ends_with(XVFB_RUN));
        let argv: Vec<_> = executable.argv().skip(1).collect();
        assert_eq!(argv, [binary.path().as_os_str()]);
    }

    #[test]
    fn test_missing_configured_path_falls_back() {
        let settings = Settings { wkhtmltopdf: Some("/definitely/not/wkhtmltopdf".into()), ..Settings::default() };
        match which::which(WKHTMLTOPDF) {
            Ok(found) => assert_eq!(Executable::resolve(&settings).unwrap().program(), found),
            Err(_) => {
                let err = Executable::resolve(&settings).unwrap_err();
                assert!(matches!(&*err, ErrorKind::NoExecutable));
            },
        }
    }

    #[test]
    fn test_leading_args() {
        let executable = Executable::new("/bin/sh").with_leading_arg("/tmp/script.sh");
        let argv: Vec<_> = executable.argv().collect();
        assert_eq!(argv, [OsStr::new("/bin/sh"), OsStr::new("/tmp/script.sh")]);
    }
}
