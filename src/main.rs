//! Command-line front end: converts one HTML document, file or URL to PDF.

use clap::Parser;
use derive_more::{Display, Error};
use exn::ResultExt;
use pagekit_render::options::{REPEATABLE_OPTIONS, normalize_key};
use pagekit_render::{Converter, Options, Source, Value};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Display, Error)]
enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not read input")]
    Input,
    #[display("could not convert to PDF")]
    Render,
    #[display("could not write output")]
    Output,
}

type Result<T> = std::result::Result<T, exn::Exn<ErrorKind>>;

/// Convert HTML, files and URLs to PDF with wkhtmltopdf.
#[derive(Parser, Debug)]
#[command(name = "pagekit", version, about, arg_required_else_help = true)]
struct Cli {
    /// HTML file path, http(s) URL, or `-` to read HTML from stdin.
    input: String,

    /// Write the PDF here instead of stdout.
    output: Option<PathBuf>,

    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, env = "PAGEKIT_CONFIG")]
    config: Option<PathBuf>,

    /// wkhtmltopdf option as `key=value`, or `key` for a bare flag.
    /// Repeatable options take `key=name=value`, e.g. `-O cookie=session=abc`.
    #[arg(short = 'O', long = "option", value_name = "KEY[=VALUE]", value_parser = parse_option)]
    options: Vec<(String, String)>,

    /// Stylesheet to inline into HTML input. May be given more than once.
    #[arg(short, long = "stylesheet", value_name = "PATH")]
    stylesheets: Vec<PathBuf>,

    /// Kill wkhtmltopdf after this many seconds.
    #[arg(short, long, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Base URL for host-relative links in HTML input.
    #[arg(long)]
    root_url: Option<String>,

    /// Scheme for protocol-relative links in HTML input.
    #[arg(long)]
    protocol: Option<String>,

    /// Run wkhtmltopdf under xvfb-run.
    #[arg(long)]
    xvfb: bool,

    /// Log debug output and drop wkhtmltopdf's `--quiet`.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = pagekit_config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    settings.verbose |= cli.verbose;
    settings.use_xvfb |= cli.xvfb;
    if cli.root_url.is_some() {
        settings.root_url = cli.root_url;
    }
    let converter = Converter::new(settings).or_raise(|| ErrorKind::Render)?;

    let mut options = build_options(cli.options);
    if let Some(protocol) = cli.protocol {
        options.insert("protocol".to_string(), Value::from(protocol));
    }
    let mut document = converter.document(read_source(&cli.input)?).with_options(options);
    for path in &cli.stylesheets {
        document = document.with_stylesheet(path).or_raise(|| ErrorKind::Render)?;
    }
    if let Some(timeout) = cli.timeout {
        document = document.with_timeout(timeout);
    }

    match cli.output.filter(|path| path.as_os_str() != "-") {
        Some(path) => {
            let output = document.to_file(&path).or_raise(|| ErrorKind::Render)?;
            tracing::info!(path = %output.path().display(), "PDF written");
        },
        None => {
            let pdf = document.to_pdf().or_raise(|| ErrorKind::Render)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&pdf).or_raise(|| ErrorKind::Output)?;
            stdout.flush().or_raise(|| ErrorKind::Output)?;
        },
    }
    Ok(())
}

fn read_source(input: &str) -> Result<Source> {
    if input == "-" {
        let mut html = String::new();
        io::stdin().read_to_string(&mut html).or_raise(|| ErrorKind::Input)?;
        return Ok(Source::Html(html));
    }
    match Source::from_text(input) {
        url @ Source::Url(_) => Ok(url),
        _ => Ok(Source::file(input)),
    }
}

fn parse_option(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some(("", _)) => Err(format!("missing option name in `{arg}`")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None if arg.is_empty() => Err("missing option name".to_string()),
        None => Ok((arg.to_string(), String::new())),
    }
}

fn parse_timeout(arg: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = arg.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{e}"))
}

/// Bare keys become presence-only flags. Repeatable options with a
/// `name=value` payload collect into one map per option.
fn build_options(pairs: Vec<(String, String)>) -> Options {
    let mut options = Options::new();
    for (key, value) in pairs {
        let repeatable = REPEATABLE_OPTIONS.contains(&format!("--{}", normalize_key(&key)).as_str());
        if value.is_empty() {
            options.insert(key, Value::Bool(true));
        } else if repeatable && let Some((name, inner)) = value.split_once('=') {
            let entry = options.entry(key).or_insert_with(|| Value::Map(Default::default()));
            if !matches!(entry, Value::Map(_)) {
                *entry = Value::Map(Default::default());
            }
            if let Value::Map(map) = entry {
                map.insert(name.to_string(), Value::from(inner));
            }
        } else {
            options.insert(key, Value::from(value));
        }
    }
    options
}
