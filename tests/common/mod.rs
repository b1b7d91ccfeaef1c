//! Shared helpers for integration tests.

#![allow(dead_code)]

use gcs_tables::lab::MemoryStore;
use gcs_tables::util::DetEntropy;
use gcs_tables::{CallbackRegistry, ClientId, Dispatch, GcsClient, GcsConfig};
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gcs_tables=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        ::tracing::info!(test = %$name, "==== test start ====");
    };
}

#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        ::tracing::debug!(section = %$name, "---- section ----");
    };
}

#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        ::tracing::info!(test = %$name, "==== test complete ====");
    };
}

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

/// A simulated process: its own registry and connection to a shared store.
pub fn process(store: &MemoryStore, seed: u64) -> GcsClient {
    let registry = Arc::new(CallbackRegistry::new());
    let connection = store.connect(Arc::clone(&registry) as Arc<dyn Dispatch>);
    GcsClient::with_entropy(
        GcsConfig::new("127.0.0.1", 40_000 + (seed % 1_000) as u16),
        registry,
        Arc::new(connection),
        &DetEntropy::new(seed),
    )
    .expect("client")
}

/// Deterministic client ID for a seed.
pub fn client_id(seed: u64) -> ClientId {
    ClientId::from_entropy(&DetEntropy::new(seed)).expect("id")
}
