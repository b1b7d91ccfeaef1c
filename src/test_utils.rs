//! Shared helpers for unit tests.
//!
//! Logging goes through `tracing-subscriber`; set `RUST_LOG` to see it.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
pub(crate) fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gcs_tables=trace"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Log the start of a test.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        ::tracing::info!(test = %$name, "==== test start ====");
    };
}

/// Log a named section inside a test.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        ::tracing::debug!(section = %$name, "---- section ----");
    };
}

/// Log successful completion of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        ::tracing::info!(test = %$name, "==== test complete ====");
    };
}

/// Assert `cond`, logging the expected and actual values first.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {{
        let ok = $cond;
        ::tracing::debug!(
            check = $msg,
            expected = ?$expected,
            actual = ?$actual,
            ok,
            "assert"
        );
        assert!(ok, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    }};
}
