//! Pub/sub channels and key namespaces.
//!
//! A table binds one [`TablePubsub`] channel and one [`TablePrefix`] for
//! its whole lifetime. The channel decides who hears about writes; the
//! prefix keeps rows of different tables apart in the store, since several
//! tables share the `NoPublish` channel and may reuse the same IDs.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Broadcast category a table publishes its writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TablePubsub {
    /// Writes never generate notifications.
    NoPublish,
    /// Task scheduling updates, routed by the owning scheduler's ID.
    Task,
    /// Node membership updates.
    Client,
    /// Object availability notifications.
    Object,
    /// Actor registration updates.
    Actor,
}

impl TablePubsub {
    /// Returns the channel name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoPublish => "NO_PUBLISH",
            Self::Task => "TASK",
            Self::Client => "CLIENT",
            Self::Object => "OBJECT",
            Self::Actor => "ACTOR",
        }
    }

    /// Returns `true` if writes on this channel notify subscribers.
    #[must_use]
    pub const fn publishes(self) -> bool {
        !matches!(self, Self::NoPublish)
    }
}

impl fmt::Display for TablePubsub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key namespace of a table's rows in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TablePrefix {
    /// Object locations.
    Object,
    /// Task scheduling records.
    Task,
    /// Node membership records.
    Client,
    /// Exported remote functions.
    Function,
    /// Exported remote classes.
    Class,
    /// Actor registrations.
    Actor,
    /// Errors pushed to drivers.
    Error,
    /// Custom serializers for user classes.
    CustomSerializer,
    /// Cluster configuration entries.
    Config,
}

impl TablePrefix {
    /// Returns the key prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "OBJECT",
            Self::Task => "TASK",
            Self::Client => "CLIENT",
            Self::Function => "FUNCTION",
            Self::Class => "CLASS",
            Self::Actor => "ACTOR",
            Self::Error => "ERROR",
            Self::CustomSerializer => "CUSTOM_SERIALIZER",
            Self::Config => "CONFIG",
        }
    }
}

impl fmt::Display for TablePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
