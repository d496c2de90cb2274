//! Tracing initialization.
//!
//! Binaries call [`init_tracing`] once at startup and keep the returned [`LogFlusher`] alive
//! until they exit, so buffered log lines are written before the process terminates. Tests
//! call [`init_test_tracing`], which is idempotent and routes output through the test harness.

use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Filter applied to test output when `RUST_LOG` is not set.
const DEFAULT_TEST_LOG_FILTER: &str = "debug";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// `RUST_LOG` contained a directive that could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// Another subscriber was already installed.
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Flushes buffered log lines when dropped.
#[must_use = "logs are lost if the flusher is dropped before the program exits"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for the binary named `app_name`.
///
/// Logs go to stderr through a non-blocking writer, leaving stdout to the program's own
/// output. The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(directives.as_deref())?;

    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_thread_names(true)
                .with_target(false),
        )
        .try_init()?;

    tracing::debug!(app = app_name, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Builds the filter for `directives`, falling back to the default when they are blank.
fn log_filter(directives: Option<&str>) -> Result<EnvFilter, TracingError> {
    match directives {
        Some(directives) if !directives.trim().is_empty() => Ok(EnvFilter::try_new(directives)?),
        _ => Ok(EnvFilter::new(DEFAULT_LOG_FILTER)),
    }
}

/// Installs a subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_LOG_FILTER));

        // Another test framework may have installed a subscriber already, which is fine.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}
