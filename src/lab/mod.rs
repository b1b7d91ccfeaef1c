//! Deterministic lab store for testing.
//!
//! The lab store provides:
//!
//! - An in-process backing store shared by any number of simulated
//!   processes, each with its own callback registry
//! - Store-side semantics: per-channel publication, atomic
//!   test-and-update, object notification requests
//! - Explicit reply delivery (no background threads): replies queue until
//!   the harness calls [`MemoryStore::run_until_idle`]
//! - Fault injection: synchronous submission failure, withheld replies
//!
//! # Quick Start
//!
//! ```
//! use gcs_tables::lab::MemoryStore;
//! use gcs_tables::types::{ConfigTableData, ConfigId};
//! use gcs_tables::{GcsConfig, JobId};
//!
//! let store = MemoryStore::new();
//! let client = store.connect_client(GcsConfig::default()).unwrap();
//!
//! let key = ConfigId::from_bytes([1; 20]);
//! let entry = ConfigTableData { key: "object_store_memory".into(), value: vec![8] };
//! client.config_table().add(JobId::nil(), key, entry, |_, _| {}).unwrap();
//!
//! assert_eq!(store.run_until_idle(), 1);
//! ```

pub mod store;

pub use store::{MemoryStore, MemoryStoreClient};
