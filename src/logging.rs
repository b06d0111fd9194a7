use std::io;

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "feedrelay=info,warn";

/// Install the global subscriber: compact lines on stderr, filtered by
/// `RUST_LOG`.  `verbose` lowers the crate's own level to debug.
///
/// Posts go to stdout through the dispatcher, so logs stay on stderr.
pub fn configure_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("feedrelay=debug,warn")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    let stderr_log = fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_log).init();
}
