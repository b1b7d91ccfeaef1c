//! Record schemas stored in the tables.
//!
//! Each record is the value of exactly one row. The store never interprets
//! them except where it must act atomically on a field: the task record's
//! scheduling state (test-and-update) and its scheduler ID (subscription
//! routing).

use super::{ActorId, ClassId, ClientId, JobId, SchedulingState};
use crate::codec::Record;
use serde::{Deserialize, Serialize};

/// Locations of an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTableData {
    /// Object managers holding a copy.
    pub managers: Vec<ClientId>,
    /// Object size in bytes.
    pub data_size: u64,
    /// Content hash, hex encoded.
    pub hash: String,
}

/// Scheduling information of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTableData {
    /// Current lifecycle state. Exactly one state bit is normally set.
    pub scheduling_state: SchedulingState,
    /// Scheduler that owns the task. Nil while unclaimed.
    pub scheduler_id: ClientId,
    /// Serialized dependencies added at execution time.
    pub execution_dependencies: Vec<u8>,
    /// Number of times the task was spilled back to another node.
    pub spillback_count: u64,
    /// Serialized task specification.
    pub task_info: Vec<u8>,
}

/// Conditional update request for a task row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTableTestAndUpdate {
    /// The update applies iff the current state intersects this mask.
    pub test_state_bitmask: SchedulingState,
    /// State written on success.
    pub update_state: SchedulingState,
    /// Scheduler recorded as the new owner on success.
    pub scheduler_id: ClientId,
}

/// Store reply to a test-and-update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAndUpdateReply {
    /// The row after the attempt. `None` when no such task exists.
    pub task: Option<TaskTableData>,
    /// Whether the update was applied.
    pub updated: bool,
}

/// Membership record of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTableData {
    /// The node's client ID.
    pub client_id: ClientId,
    /// IP address of the node manager.
    pub node_manager_address: String,
    /// TCP port of the node manager.
    pub node_manager_port: u16,
    /// `false` once the node has disconnected.
    pub alive: bool,
}

/// An exported remote function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionTableData {
    /// Job that exported the function.
    pub job_id: JobId,
    /// Module the function lives in.
    pub module: String,
    /// Function name.
    pub name: String,
    /// Pickled function body.
    pub data: Vec<u8>,
}

/// An exported remote class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTableData {
    /// Job that exported the class.
    pub job_id: JobId,
    /// Class name.
    pub name: String,
    /// Pickled class definition.
    pub data: Vec<u8>,
}

/// Registration of an actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorTableData {
    /// The actor.
    pub actor_id: ActorId,
    /// Class the actor was created from.
    pub class_id: ClassId,
    /// Job that created the actor.
    pub job_id: JobId,
    /// Node manager hosting the actor.
    pub node_manager_id: ClientId,
}

/// An error pushed to a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTableData {
    /// Job the error belongs to.
    pub job_id: JobId,
    /// Error category.
    pub error_type: String,
    /// Human-readable message.
    pub error_message: String,
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// Custom serializer registered for a class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSerializerData {
    /// Job that registered the serializer.
    pub job_id: JobId,
    /// Pickled serializer.
    pub serializer: Vec<u8>,
    /// Pickled deserializer.
    pub deserializer: Vec<u8>,
}

/// A cluster configuration entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTableData {
    /// Configuration key.
    pub key: String,
    /// Encoded value.
    pub value: Vec<u8>,
}

macro_rules! impl_record {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Record for $ty {
                const NAME: &'static str = stringify!($ty);
            }
        )*
    };
}

impl_record!(
    ObjectTableData,
    TaskTableData,
    TaskTableTestAndUpdate,
    TestAndUpdateReply,
    ClientTableData,
    FunctionTableData,
    ClassTableData,
    ActorTableData,
    ErrorTableData,
    CustomSerializerData,
    ConfigTableData,
);
