use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use feedrelay::config::Config;
use feedrelay::dispatch::ConsoleDispatcher;
use feedrelay::logging::configure_logging;
use feedrelay::poll::{IngestLoop, StopSignal};
use feedrelay::source::{self, HttpFeedTransport, Source, Transports, VkWallTransport, WallTransport};
use feedrelay::watermark::FileWatermarkStore;

#[derive(Debug, Parser)]
#[command(version, about = "Relay new feed and wall posts to a channel, oldest first")]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "feedrelay.toml")]
    config: PathBuf,

    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,

    /// Override the configured sleep between cycles, in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Debug-level logging for this crate (ignored when RUST_LOG is set).
    #[arg(short, long)]
    verbose: bool,
}

/// Exit status after a forced exit on the second Ctrl-C (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Ask the loop to stop at its next check.
    Stop,
    /// The loop is still busy (e.g. inside an HTTP fetch); leave now.
    Exit,
}

fn on_ctrl_c(presses: u32) -> Interrupt {
    if presses <= 1 {
        Interrupt::Stop
    } else {
        Interrupt::Exit
    }
}

/// Forward Ctrl-C to the loop.  Signal handling needs a runtime; the loop
/// itself stays synchronous.  The listener keeps running so a second Ctrl-C
/// can end a process stuck in a slow fetch.
fn spawn_stop_listener() -> Result<StopSignal> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        runtime.block_on(async {
            let mut presses = 0;
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                    return;
                }
                presses += 1;
                match on_ctrl_c(presses) {
                    Interrupt::Stop => {
                        tracing::info!("Ctrl-C received, stopping (press again to exit immediately)");
                        let _ = tx.send(());
                    }
                    Interrupt::Exit => {
                        tracing::warn!("second Ctrl-C, exiting without finishing the cycle");
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                }
            }
        });
    });

    Ok(StopSignal::new(rx))
}

fn build_sources(config: &Config) -> Result<Vec<Box<dyn Source>>> {
    let timeout = config.fetch_timeout();
    let wall = match (config.wall.as_ref(), config.wall_token()) {
        (Some(wall), Some(token)) => {
            let transport = VkWallTransport::new(token, wall.api_version.as_str(), timeout)
                .context("building wall API client")?;
            Some(Arc::new(transport) as Arc<dyn WallTransport>)
        }
        _ => None,
    };
    let transports = Transports {
        feed: Arc::new(HttpFeedTransport::new(timeout).context("building feed HTTP client")?),
        wall,
    };

    config
        .sources
        .iter()
        .map(|cfg| source::build(cfg, &transports).map_err(anyhow::Error::from))
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_logging(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let interval = cli
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.interval());

    let sources = build_sources(&config)?;
    let stop = spawn_stop_listener()?;

    tracing::info!(
        config = %cli.config.display(),
        sources = sources.len(),
        interval_secs = interval.as_secs(),
        "starting feedrelay"
    );

    let mut ingest = IngestLoop::new(
        sources,
        FileWatermarkStore::new(&config.watermark_path),
        ConsoleDispatcher::stdout(),
        interval,
    );
    ingest.run(&stop, cli.once);

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_ctrl_c_stops_and_later_ones_exit() {
        assert_eq!(on_ctrl_c(1), Interrupt::Stop);
        assert_eq!(on_ctrl_c(2), Interrupt::Exit);
        assert_eq!(on_ctrl_c(5), Interrupt::Exit);
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["feedrelay"]);
        assert_eq!(cli.config, PathBuf::from("feedrelay.toml"));
        assert!(!cli.once);
        assert!(cli.interval.is_none());
    }

    #[test]
    fn cli_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["feedrelay", "--interval", "0"]).is_err());
    }
}
