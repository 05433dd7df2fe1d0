//! Tracing subscriber setup
//!
//! Logs go to stderr so stdout stays free for documents Helm reads.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter when `RUST_LOG` is unset
fn default_level(debug: bool, quiet: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    }
}

/// Install the global subscriber
///
/// `--debug` wins over `RUST_LOG`; otherwise `RUST_LOG` wins over the
/// command's default.
pub fn init(debug: bool, quiet: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = default_level(debug, quiet);
    let filter = if debug {
        EnvFilter::try_new(level)?
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
