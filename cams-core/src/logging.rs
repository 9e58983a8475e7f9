//! Shared logging setup for CAMS binaries.

use crate::Result;
use tracing_subscriber::EnvFilter;

/// Default level for a verbosity flag count.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging.
///
/// `RUST_LOG` takes precedence over the level implied by `verbose` and
/// `quiet`. With `json` set, events are written as one JSON object per line.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `json` - Emit JSON lines instead of human-readable output
///
/// # Example
/// ```rust,no_run
/// use cams_core::logging::init_logging;
///
/// init_logging(1, false, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, json: bool) -> Result<()> {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| {
        crate::error::CamsError::configuration(format!("Failed to initialize logging: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let cases = [
            ((true, 0), tracing::Level::ERROR),
            ((true, 5), tracing::Level::ERROR),
            ((false, 0), tracing::Level::INFO),
            ((false, 1), tracing::Level::DEBUG),
            ((false, 2), tracing::Level::TRACE),
            ((false, 10), tracing::Level::TRACE),
        ];
        for ((quiet, verbose), expected) in cases {
            assert_eq!(
                level_for(verbose, quiet),
                expected,
                "quiet={quiet}, verbose={verbose}"
            );
        }
    }
}
