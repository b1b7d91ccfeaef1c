//! gcs-tables: typed asynchronous tables over a shared pub/sub key-value store.
//!
//! # Overview
//!
//! This crate is the client-side coordination layer of a cluster control
//! plane. Scheduler and worker processes use it to publish and observe
//! cluster metadata (object locations, task scheduling state, actor
//! registration, node liveness) without a central lock. The store itself
//! is an external collaborator reached through the [`store::StoreClient`]
//! contract.
//!
//! # Core Guarantees
//!
//! - **Non-blocking submission**: every operation hands a command to the
//!   store client and returns; results arrive later through the
//!   [`callback::CallbackRegistry`]
//! - **One entry per request**: a one-shot request owns exactly one registry
//!   entry until its reply fires; a subscription owns exactly one entry for
//!   its whole lifetime
//! - **Installed before data**: every subscription reports installation
//!   exactly once before any data event
//! - **Lock-free ownership handoff**: task test-and-update is atomic at the
//!   store, so at most one competing scheduler wins each transition
//!
//! # Module Structure
//!
//! - [`types`]: Identifiers, scheduling state, pub/sub channels, records
//! - [`codec`]: Record encoding (MessagePack via `rmp-serde`)
//! - [`error`](mod@error): Error types
//! - [`callback`]: Callback registry correlating replies with requests
//! - [`store`]: Backing store contract (commands, subscriptions, replies)
//! - [`table`]: Generic table plus object, task and client specializations
//! - [`client`]: Aggregate client owning every table
//! - [`config`]: Client configuration
//! - [`lab`]: Deterministic in-memory backing store for tests and simulation
//! - [`util`]: Entropy sources and a seeded deterministic RNG
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod callback;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod lab;
pub mod store;
pub mod table;
pub mod tracing_compat;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;

pub use callback::{CallbackHandle, CallbackRegistry, Dispatch, DispatchOutcome, Lifetime};
pub use client::GcsClient;
pub use codec::{CodecError, Record};
pub use config::GcsConfig;
pub use error::{Error, ErrorKind, Result};
pub use store::{Command, CommandKind, Reply, StoreClient, Subscription};
pub use table::{
    ActorTable, ClassTable, ClientInformation, ClientTable, ConfigTable, ConnectionState,
    CustomSerializerTable, ErrorTable, FunctionTable, MembershipTracking, ObjectTable, Table,
    TaskTable,
};
pub use types::{
    ActorId, ClassId, ClientId, ConfigId, FunctionId, JobId, ObjectId, SchedulingState,
    TableId, TablePrefix, TablePubsub, TaskId, UniqueId,
};
