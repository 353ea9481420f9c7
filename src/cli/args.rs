//! Command-line argument parsing for the draftwire CLI.

use std::fmt;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Run one streaming session
    Run(RunArgs),
}

/// Options for a streaming run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunArgs {
    pub url: String,
    /// Request body; a POST is sent when present
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    pub no_fallback: bool,
    /// Number of `-v` flags
    pub verbose: u8,
}

/// Argument errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgsError {
    MissingUrl,
    MissingValue(String),
    InvalidHeader(String),
    UnknownFlag(String),
    UnexpectedArgument(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingUrl => write!(f, "missing <url>"),
            ArgsError::MissingValue(flag) => write!(f, "{} requires a value", flag),
            ArgsError::InvalidHeader(value) => {
                write!(f, "invalid header '{}', expected NAME:VALUE", value)
            }
            ArgsError::UnknownFlag(flag) => write!(f, "unknown flag '{}'", flag),
            ArgsError::UnexpectedArgument(arg) => write!(f, "unexpected argument '{}'", arg),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Usage text printed for `--help` and argument errors.
pub const USAGE: &str = "\
Usage: draftwire <url> [options]

Options:
  --body <json>          Send a POST with this body
  --header <name:value>  Add a request header (repeatable)
  --no-fallback          Fail instead of retrying without streaming
  -v, -vv                Raise log verbosity
  -V, --version          Print version
  -h, --help             Print this help";

/// Parse command-line arguments into a command.
///
/// # Examples
///
/// ```
/// use draftwire::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["draftwire".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), Ok(CliCommand::Version));
/// ```
pub fn parse_args<I>(args: I) -> Result<CliCommand, ArgsError>
where
    I: Iterator<Item = String>,
{
    let mut run = RunArgs::default();
    let mut url = None;
    // Skip the program name
    let mut args = args.skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(CliCommand::Version),
            "--help" | "-h" => return Ok(CliCommand::Help),
            "--no-fallback" => run.no_fallback = true,
            "-v" => run.verbose = run.verbose.saturating_add(1),
            "-vv" => run.verbose = run.verbose.saturating_add(2),
            "--body" => {
                let value = args.next().ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                run.body = Some(value);
            }
            "--header" | "-H" => {
                let value = args.next().ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                run.headers.push(parse_header(&value)?);
            }
            flag if flag.starts_with('-') => return Err(ArgsError::UnknownFlag(arg)),
            _ if url.is_none() => url = Some(arg),
            _ => return Err(ArgsError::UnexpectedArgument(arg)),
        }
    }

    run.url = url.ok_or(ArgsError::MissingUrl)?;
    Ok(CliCommand::Run(run))
}

fn parse_header(value: &str) -> Result<(String, String), ArgsError> {
    match value.split_once(':') {
        Some((name, val)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), val.trim().to_string()))
        }
        _ => Err(ArgsError::InvalidHeader(value.to_string())),
    }
}
