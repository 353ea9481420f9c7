//! CLI module for draftwire.
//!
//! Runs one streaming session against a URL and prints every delivered
//! event as a JSON line on stdout.
//!
//! ```ignore
//! use draftwire::cli::{parse_args, run, CliCommand};
//!
//! match parse_args(std::env::args())? {
//!     CliCommand::Run(args) => std::process::exit(run(args).await?),
//!     _ => {}
//! }
//! ```

pub mod args;

pub use args::{parse_args, ArgsError, CliCommand, RunArgs, USAGE};

use std::io::Write;
use std::sync::Arc;

use crate::adapters::ReqwestHttpClient;
use crate::config::SessionConfig;
use crate::session::{SessionState, StreamSession};
use crate::traits::{HttpClient, TransportRequest};

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the transport request for a run.
pub fn request_for(args: &RunArgs) -> TransportRequest {
    let request = match &args.body {
        Some(body) => TransportRequest::post(&args.url, body.as_str())
            .with_header("Content-Type", "application/json"),
        None => TransportRequest::get(&args.url),
    };
    args.headers
        .iter()
        .fold(request, |request, (name, value)| {
            request.with_header(name.as_str(), value.as_str())
        })
}

/// Run a session and print its events.
///
/// Returns the process exit code: 0 when the session completed, 1 when it
/// ended in error, 130 when it was interrupted.
pub async fn run(args: RunArgs) -> color_eyre::Result<i32> {
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    run_with_client(client, args).await
}

/// [`run`] over a caller-supplied transport.
pub async fn run_with_client(
    client: Arc<dyn HttpClient>,
    args: RunArgs,
) -> color_eyre::Result<i32> {
    let mut config = SessionConfig::from_env();
    if args.no_fallback {
        config = config.with_fallback(false);
    }

    let session = StreamSession::new(client, request_for(&args))
        .with_config(config)
        .on_any(|event| {
            let line = serde_json::to_string(event).unwrap_or_default();
            let mut stdout = std::io::stdout().lock();
            if writeln!(stdout, "{}", line).and_then(|_| stdout.flush()).is_err() {
                tracing::warn!("stdout closed, dropping event output");
            }
        });

    let cancel = session.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            cancel.cancel();
        }
    });

    let outcome = session.run().await;
    interrupt.abort();

    if let Some(err) = &outcome.error {
        tracing::error!(
            code = err.error_code(),
            category = err.category().description(),
            retryable = err.is_retryable(),
            "{}",
            err
        );
    }

    Ok(match outcome.state {
        SessionState::Completed => 0,
        SessionState::Cancelled => 130,
        _ => 1,
    })
}
