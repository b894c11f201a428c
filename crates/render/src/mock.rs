//! A stand-in for wkhtmltopdf, for testing.

use crate::executable::Executable;
use crate::os::Platform;
use crate::settings::Settings;
use crate::Converter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Bytes written by the fake renderer in place of a real PDF.
pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n%fake\n";

const SCRIPT: &str = "wkhtmltopdf.sh";
const ARGS: &str = "args";
const STDIN: &str = "stdin";

/// A POSIX shell script that behaves like wkhtmltopdf from the outside.
///
/// It records its arguments (one per line) and whatever it reads from stdin,
/// then writes [`FAKE_PDF`] to the destination token: stdout for `-`, or the
/// given path. It is run through `/bin/sh` rather than executed directly, so
/// no executable bit is needed.
///
/// The recordings are overwritten by every run, which suits one conversion
/// per fake. Concurrent tests should each build their own.
///
/// # Examples
///
/// ```no_run
/// use pagekit_render::mock::FakeWkhtmltopdf;
/// use pagekit_render::Settings;
///
/// let fake = FakeWkhtmltopdf::default();
/// let converter = fake.converter(Settings::default());
/// let pdf = converter.document("<h1>Oh Hai</h1>").to_pdf()?;
/// assert!(pdf.starts_with(b"%PDF"));
/// assert_eq!(fake.stdin(), b"<h1>Oh Hai</h1>");
/// # Ok::<(), pagekit_render::Error>(())
/// ```
#[derive(Debug)]
pub struct FakeWkhtmltopdf {
    dir: TempDir,
}
impl FakeWkhtmltopdf {
    pub fn builder() -> FakeBuilder {
        FakeBuilder::default()
    }

    /// The executable to hand to [`Converter::with_executable`].
    pub fn executable(&self) -> Executable {
        Executable::new("/bin/sh").with_leading_arg(self.dir.path().join(SCRIPT))
    }

    pub fn converter(&self, settings: Settings) -> Converter {
        Converter::with_executable(settings, self.executable())
    }

    /// Arguments received by the last run, excluding the program itself.
    pub fn args(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join(ARGS))
            .map(|args| args.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Bytes received on stdin by the last run.
    pub fn stdin(&self) -> Vec<u8> {
        std::fs::read(self.dir.path().join(STDIN)).unwrap_or_default()
    }

    /// Whether the fake has been run at all.
    pub fn was_run(&self) -> bool {
        self.dir.path().join(ARGS).exists()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
impl Default for FakeWkhtmltopdf {
    fn default() -> Self {
        FakeBuilder::default().build()
    }
}

/// Configures how a [`FakeWkhtmltopdf`] misbehaves.
#[derive(Debug, Clone, Default)]
pub struct FakeBuilder {
    exit_code: i32,
    sleep: Option<Duration>,
    stderr: Option<String>,
    silent: bool,
}
impl FakeBuilder {
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Sleeps before producing output.
    pub fn sleep(mut self, duration: Duration) -> Self {
        self.sleep = Some(duration);
        self
    }

    pub fn stderr(mut self, message: impl Into<String>) -> Self {
        self.stderr = Some(message.into());
        self
    }

    /// Produces no output at all.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Writes the script into a fresh temporary directory.
    ///
    /// Panics if the directory cannot be written: a broken test fixture
    /// should not let a test pass.
    pub fn build(self) -> FakeWkhtmltopdf {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => panic!("FakeWkhtmltopdf: cannot create temporary directory: {e}"),
        };
        let script = self.script(dir.path());
        if let Err(e) = std::fs::write(dir.path().join(SCRIPT), script) {
            panic!("FakeWkhtmltopdf: cannot write script: {e}");
        }
        FakeWkhtmltopdf { dir }
    }

    fn script(&self, dir: &Path) -> String {
        let quote = |path: PathBuf| Platform::Unix.quote(&path.to_string_lossy()).into_owned();
        let mut script = String::from("#!/bin/sh\n");
        script.push_str(&format!("printf '%s\\n' \"$@\" > {}\n", quote(dir.join(ARGS))));
        script.push_str(&format!("cat > {}\n", quote(dir.join(STDIN))));
        if let Some(sleep) = self.sleep {
            script.push_str(&format!("sleep {}\n", sleep.as_secs_f64()));
        }
        if let Some(message) = &self.stderr {
            script.push_str(&format!("printf '%s\\n' {} >&2\n", Platform::Unix.quote(message)));
        }
        if !self.silent {
            script.push_str("for destination; do :; done\n");
            // As a printf format: `%` doubled, newlines escaped.
            let pdf = String::from_utf8_lossy(FAKE_PDF).replace('%', "%%").replace('\n', "\\n");
            script.push_str(&format!(
                "if [ \"$destination\" = - ]; then printf '{pdf}'; else printf '{pdf}' > \"$destination\"; fi\n"
            ));
        }
        script.push_str(&format!("exit {}\n", self.exit_code));
        script
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_records_args_and_stdin() {
        let fake = FakeWkhtmltopdf::default();
        assert!(!fake.was_run());
        let pdf = fake.converter(Settings::default()).document("<h1>Oh Hai</h1>").to_pdf().unwrap();
        assert_eq!(pdf, FAKE_PDF);
        assert_eq!(fake.stdin(), b"<h1>Oh Hai</h1>");
        let args = fake.args();
        assert_eq!(&args[args.len() - 2..], ["-", "-"]);
        assert!(args.contains(&"--quiet".to_string()));
    }

    #[test]
    fn test_writes_destination_file() {
        let fake = FakeWkhtmltopdf::default();
        let output = fake.converter(Settings::default()).document("<p>x</p>").to_temp().unwrap();
        assert_eq!(std::fs::read(output.path()).unwrap(), FAKE_PDF);
    }

    #[test]
    fn test_silent_fails() {
        let fake = FakeWkhtmltopdf::builder().silent().stderr("Exit with code 1").build();
        let err = fake.converter(Settings::default()).document("<p>x</p>").to_pdf().unwrap_err();
        match &*err {
            ErrorKind::ConversionFailed { status, stderr, .. } => {
                assert_eq!(*status, Some(0));
                assert_eq!(stderr.trim(), "Exit with code 1");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
