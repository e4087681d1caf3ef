//! SUSA execution bridge.
//!
//! Runs SUSA programs for the web playground.  Requests go to the real
//! interpreter when it is installed and to a line-oriented simulator
//! ([`script`]) otherwise; [`server`] exposes both over a small HTTP/JSON
//! endpoint.

pub mod cli;
pub mod config;
pub mod executor;
pub mod interpreter;
pub mod script;
pub mod server;
pub mod var;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber (stderr, `RUST_LOG` aware).
///
/// Without `RUST_LOG` the level is `info`, or `debug` when `debug` is set.
/// Safe to call more than once; only the first call has an effect.
pub fn init_tracing(debug: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let default = if debug { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
