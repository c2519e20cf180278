//! Logging Setup
//!
//! The library only emits `tracing` events; binaries install a subscriber
//! through [`init`]. `RUST_LOG` overrides the default level.

use tracing::Level;
use tracing_subscriber::EnvFilter;

fn env_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber, writing to stderr.
///
/// Does nothing if a global subscriber is already set.
pub fn init(verbose: bool, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr);

    if json {
        builder.json().try_init().ok();
    } else {
        builder.try_init().ok();
    }
}
