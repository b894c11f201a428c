//! Running wkhtmltopdf.
//!
//! An [`Invocation`] is a fully-built command: program, argv, an optional
//! payload for stdin and an optional output file. Running it spawns exactly
//! one child process with discrete arguments; no shell is involved.
//!
//! stdout and stderr are drained on their own threads and stdin is fed from
//! a third, so a child blocked on a full output pipe can never deadlock
//! against our write of its input.

use crate::error::{ErrorKind, Result};
use crate::executable::Executable;
use crate::os::Platform;
use crate::source::STDIO_SENTINEL;
use exn::{OptionExt, ResultExt};
use std::ffi::{OsStr, OsString};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::instrument;

const POLL_INTERVAL_MIN: Duration = Duration::from_millis(5);
const POLL_INTERVAL_MAX: Duration = Duration::from_millis(100);

/// A wkhtmltopdf command, ready to run (or to inspect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    executable: Executable,
    args: Vec<OsString>,
    stdin: Option<Vec<u8>>,
    output: Option<PathBuf>,
    accepted_exit_codes: Vec<i32>,
}
impl Invocation {
    /// `args` are wkhtmltopdf's flags; the source and destination tokens are
    /// appended here so they always come last.
    pub fn new(executable: Executable, flags: Vec<String>, source: OsString, output: Option<PathBuf>) -> Self {
        let mut args: Vec<OsString> = flags.into_iter().map(OsString::from).collect();
        args.push(source);
        args.push(output.as_ref().map_or_else(|| OsString::from(STDIO_SENTINEL), |path| path.clone().into_os_string()));
        Self { executable, args, stdin: None, output, accepted_exit_codes: Vec::new() }
    }

    /// Bytes written to the child's stdin before it is closed.
    pub fn with_stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Non-zero exit codes that still count as success (lenient mode).
    pub fn with_accepted_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.accepted_exit_codes = codes.into_iter().collect();
        self
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    /// wkhtmltopdf's arguments, ending with the source and destination tokens.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn accepted_exit_codes(&self) -> &[i32] {
        &self.accepted_exit_codes
    }

    /// The complete argv, program first.
    pub fn argv(&self) -> Vec<&OsStr> {
        self.executable.argv().chain(self.args.iter().map(OsString::as_os_str)).collect()
    }

    /// The argv as one shell-quoted line, for logs and error messages only.
    pub fn command_line(&self, platform: Platform) -> String {
        platform.join(self.argv().into_iter().map(|arg| arg.to_string_lossy()))
    }

    /// Runs the command and returns whatever it wrote to stdout.
    ///
    /// When writing to a file the returned bytes are normally empty, and
    /// success additionally requires the file to be non-empty. When writing
    /// to stdout, success requires non-whitespace output.
    #[instrument(skip(self), fields(program = %self.executable.program().display(), stdin_size = self.stdin.as_ref().map(Vec::len)))]
    pub fn run(&self, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let mut child = self.spawn()?;

        let writer = match (child.stdin.take(), self.stdin.clone()) {
            (Some(mut pipe), Some(payload)) => Some(thread::spawn(move || {
                // The pipe is closed when it goes out of scope, signalling EOF.
                if let Err(e) = pipe.write_all(&payload) {
                    // The child may legitimately exit before consuming all input.
                    tracing::trace!(error = %e, "Writing to wkhtmltopdf stdin failed");
                }
            })),
            // Dropping the pipe closes it: no input is expected.
            _ => None,
        };
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match timeout {
            Some(timeout) => wait_with_deadline(&mut child, timeout)?,
            None => Some(child.wait().or_raise(|| ErrorKind::Io)?),
        };
        let Some(status) = status else {
            // Drain threads are left to finish on their own: a grandchild may
            // still hold the pipes open after the kill.
            let timeout = timeout.unwrap_or_default();
            tracing::warn!(timeout_secs = timeout.as_secs_f64(), "wkhtmltopdf timed out and was killed");
            exn::bail!(ErrorKind::Timeout(timeout));
        };

        if let Some(writer) = writer {
            writer.join().ok().ok_or_raise(|| ErrorKind::Io)?;
        }
        let stdout = join(stdout)?;
        let stderr = String::from_utf8_lossy(&join(stderr)?).into_owned();

        self.check(status, &stdout, stderr)?;
        Ok(stdout)
    }

    fn spawn(&self) -> Result<Child> {
        let mut command = Command::new(self.executable.program());
        command
            .args(self.executable.leading_args())
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match command.spawn() {
            Ok(child) => {
                tracing::debug!(pid = child.id(), command = %self.command_line(Platform::current()), "Spawned wkhtmltopdf");
                Ok(child)
            },
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                tracing::debug!(error = %e, program = %self.executable.program().display(), "Executable vanished before spawn");
                exn::bail!(ErrorKind::NoExecutable)
            },
            Err(e) => Err(e).or_raise(|| ErrorKind::Io),
        }
    }

    fn check(&self, status: ExitStatus, stdout: &[u8], stderr: String) -> Result<()> {
        let code = status.code();
        let exited_ok = status.success() || code.is_some_and(|c| self.accepted_exit_codes.contains(&c));
        let produced = match &self.output {
            Some(path) => std::fs::metadata(path).is_ok_and(|meta| meta.len() > 0),
            None => !stdout.trim_ascii().is_empty(),
        };
        if exited_ok && produced {
            if !status.success() {
                tracing::debug!(status = ?code, "Accepting non-zero exit status in lenient mode");
            }
            return Ok(());
        }
        tracing::debug!(status = ?code, produced, stderr = %stderr, "wkhtmltopdf failed");
        exn::bail!(ErrorKind::ConversionFailed { status: code, command: self.command_line(Platform::current()), stderr })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    match handle {
        Some(handle) => handle.join().ok().ok_or_raise(|| ErrorKind::Io)?.or_raise(|| ErrorKind::Io),
        None => Ok(Vec::new()),
    }
}

/// Waits for the child until `timeout` elapses. On expiry the child is
/// killed and reaped, and `None` is returned.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    let mut interval = POLL_INTERVAL_MIN;
    loop {
        if let Some(status) = child.try_wait().or_raise(|| ErrorKind::Io)? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(interval.min(deadline - now));
        interval = (interval * 2).min(POLL_INTERVAL_MAX);
    }
    if let Err(e) = child.kill() {
        // Already exited between the last poll and the kill.
        tracing::trace!(error = %e, "Killing wkhtmltopdf failed");
    }
    child.wait().or_raise(|| ErrorKind::Io)?;
    Ok(None)
}
