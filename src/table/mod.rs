//! Typed tables over the backing store.
//!
//! - [`Table`]: generic add/lookup/subscribe protocol, parameterized by key
//!   and record type and bound to one channel and key namespace
//! - [`ObjectTable`]: object locations plus the two-phase notification
//!   protocol
//! - [`TaskTable`]: task scheduling records plus atomic test-and-update
//! - [`ClientTable`]: node membership plus a local liveness cache
//!
//! The specializations wrap a generic table rather than extending it; each
//! one fixes its channel and namespace at construction.

pub mod client;
pub mod generic;
pub mod object;
pub mod task;

pub use client::{ClientInformation, ClientTable, ConnectionState, MembershipTracking};
pub use generic::Table;
pub use object::ObjectTable;
pub use task::TaskTable;

use crate::types::{
    ActorId, ActorTableData, ClassId, ClassTableData, ConfigId, ConfigTableData,
    CustomSerializerData, ErrorTableData, FunctionId, FunctionTableData, TaskId,
};

/// Exported remote functions. Does not publish.
pub type FunctionTable = Table<FunctionId, FunctionTableData>;

/// Exported remote classes. Does not publish.
pub type ClassTable = Table<ClassId, ClassTableData>;

/// Actor registrations. Publishes on the actor channel.
pub type ActorTable = Table<ActorId, ActorTableData>;

/// Errors pushed to drivers, keyed by the failing task. Does not publish.
pub type ErrorTable = Table<TaskId, ErrorTableData>;

/// Custom serializers keyed by class. Does not publish.
pub type CustomSerializerTable = Table<ClassId, CustomSerializerData>;

/// Cluster configuration entries. Does not publish.
pub type ConfigTable = Table<ConfigId, ConfigTableData>;
