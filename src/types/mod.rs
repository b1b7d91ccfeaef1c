//! Core types shared by the tables and the store contract.
//!
//! - [`id`]: Identifier types (`UniqueId` and its typed wrappers)
//! - [`state`]: Task scheduling state bitfield
//! - [`pubsub`]: Pub/sub channels and key namespaces
//! - [`record`]: Record schemas stored in the tables

pub mod id;
pub mod pubsub;
pub mod record;
pub mod state;

pub use id::{
    ActorId, ClassId, ClientId, ConfigId, FunctionId, ID_SIZE, JobId, ObjectId, ParseIdError,
    TableId, TaskId, UniqueId,
};
pub use pubsub::{TablePrefix, TablePubsub};
pub use record::{
    ActorTableData, ClassTableData, ClientTableData, ConfigTableData, CustomSerializerData,
    ErrorTableData, FunctionTableData, ObjectTableData, TaskTableData, TaskTableTestAndUpdate,
    TestAndUpdateReply,
};
pub use state::SchedulingState;
