//! Logging setup.
//!
//! Filter directives come from `DRAFTWIRE_LOG`, then `RUST_LOG`, then the
//! given default. Output goes to stderr so stdout stays free for event lines.

use tracing_subscriber::EnvFilter;

/// Environment variable read first for filter directives.
pub const LOG_ENV: &str = "DRAFTWIRE_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Build the filter from the environment, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    std::env::var(LOG_ENV)
        .ok()
        .or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

/// Install the global subscriber.
///
/// Safe to call more than once; only the first call installs anything.
/// `verbose` raises the default level to `debug` (1) or `trace` (2+).
pub fn init(verbose: u8) {
    let default = match verbose {
        0 => DEFAULT_DIRECTIVE,
        1 => "debug",
        _ => "trace",
    };

    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default))
        .with_writer(std::io::stderr)
        .with_target(verbose >= 1)
        .with_line_number(verbose >= 2)
        .try_init();

    if result.is_ok() {
        tracing::debug!(verbose, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_prefers_crate_variable() {
        std::env::set_var(LOG_ENV, "draftwire=trace");
        let filter = env_filter("warn");
        std::env::remove_var(LOG_ENV);
        assert_eq!(filter.to_string(), "draftwire=trace");
    }

    #[test]
    #[serial]
    fn test_env_filter_default() {
        std::env::remove_var(LOG_ENV);
        std::env::remove_var(EnvFilter::DEFAULT_ENV);
        assert_eq!(env_filter("warn").to_string(), "warn");
    }

    #[test]
    fn test_init_is_idempotent() {
        init(0);
        init(2);
    }
}
