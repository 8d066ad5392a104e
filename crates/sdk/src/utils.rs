//! # zkVerify SDK Utilities
//!
//! A collection of utilities for the zkVerify SDK.

use std::future::Future;
use std::io;
use std::sync::Once;

use tokio::runtime::{Handle, Runtime};
use tokio::task::block_in_place;
use tracing_forest::ForestLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

static INIT: Once = Once::new();

/// Set up the logger.
///
/// `RUST_LOG` selects what is shown (default `info`). `RUST_LOGGER=forest` renders spans as a
/// tree; anything else uses compact flat lines.
pub fn setup_logger() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let logger_type = std::env::var("RUST_LOGGER").unwrap_or_else(|_| "flat".to_string());
        match logger_type.as_str() {
            "forest" => {
                Registry::default().with(env_filter).with(ForestLayer::default()).init();
            }
            _ => {
                tracing_subscriber::fmt::Subscriber::builder()
                    .compact()
                    .with_file(false)
                    .with_target(false)
                    .with_thread_names(false)
                    .with_env_filter(env_filter)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(std::io::stderr)
                    .finish()
                    .init();
            }
        }
    });
}

/// Drives `fut` to completion from synchronous code.
///
/// Inside a multi-threaded tokio runtime the current worker is handed over with
/// `block_in_place`; elsewhere a fresh runtime is built, and failing to build it is returned.
pub fn block_on<F: Future>(fut: F) -> io::Result<F::Output> {
    match Handle::try_current() {
        Ok(handle) => Ok(block_in_place(|| handle.block_on(fut))),
        Err(_) => Ok(Runtime::new()?.block_on(fut)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_outside_runtime() {
        assert_eq!(block_on(async { 40 + 2 }).unwrap(), 42);
    }

    #[test]
    fn test_setup_logger_is_idempotent() {
        setup_logger();
        setup_logger();
    }
}
