//! Identifier types for cluster entities.
//!
//! Every identifier is an opaque 20-byte token. [`UniqueId`] is the untyped
//! form used on the wire; the typed wrappers ([`ObjectId`], [`TaskId`],
//! [`ClientId`], ...) keep tables from mixing up key spaces. Uniqueness is
//! the creator's responsibility: IDs are minted from an
//! [`EntropySource`] and never reused.

use crate::error::Result;
use crate::util::{EntropySource, OsEntropy};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Width of every identifier in bytes.
pub const ID_SIZE: usize = 20;

// ---------------------------------------------------------------------------
// UniqueId: untyped 160-bit identifier
// ---------------------------------------------------------------------------

/// Untyped 160-bit identifier.
///
/// The all-zero value is the nil ID. Subscriptions use it to mean "every
/// key"; it is never minted by [`UniqueId::from_random`] in practice.
///
/// ```
/// use gcs_tables::UniqueId;
///
/// let id = UniqueId::from_bytes([0xab; 20]);
/// let parsed: UniqueId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// assert!(UniqueId::nil().is_nil());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId([u8; ID_SIZE]);

impl UniqueId {
    /// The nil identifier.
    #[must_use]
    pub const fn nil() -> Self {
        Self([0; ID_SIZE])
    }

    /// Returns `true` for the nil identifier.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Construct from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Construct from a slice, which must be exactly [`ID_SIZE`] bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; ID_SIZE]>::try_from(bytes).ok().map(Self)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Mint a fresh identifier from OS entropy.
    pub fn from_random() -> Result<Self> {
        Self::from_entropy(&OsEntropy)
    }

    /// Mint a fresh identifier from the given entropy source.
    pub fn from_entropy(source: &dyn EntropySource) -> Result<Self> {
        let mut bytes = [0u8; ID_SIZE];
        source.fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Default for UniqueId {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueId({self})")
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for UniqueId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let err = || ParseIdError {
            kind: "UniqueId",
            input_len: s.len(),
        };
        if s.len() != ID_SIZE * 2 || !s.is_ascii() {
            return Err(err());
        }
        let mut bytes = [0u8; ID_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        Ok(Self(bytes))
    }
}

/// Error returned when an identifier string is not 40 hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// Which identifier type was being parsed.
    pub kind: &'static str,
    /// Length of the rejected input.
    pub input_len: usize,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {}: expected {} hex digits, got {} characters",
            self.kind,
            ID_SIZE * 2,
            self.input_len
        )
    }
}

impl std::error::Error for ParseIdError {}

// ---------------------------------------------------------------------------
// Typed identifiers
// ---------------------------------------------------------------------------

/// Key type accepted by a [`Table`](crate::table::Table).
pub trait TableId:
    Copy
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + From<UniqueId>
    + Into<UniqueId>
{
}

impl<T> TableId for T where
    T: Copy
        + Eq
        + Ord
        + Hash
        + fmt::Debug
        + fmt::Display
        + Send
        + Sync
        + 'static
        + From<UniqueId>
        + Into<UniqueId>
{
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(UniqueId);

        impl $name {
            /// The nil identifier.
            #[must_use]
            pub const fn nil() -> Self {
                Self(UniqueId::nil())
            }

            /// Returns `true` for the nil identifier.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Wrap an untyped identifier.
            #[must_use]
            pub const fn from_unique(id: UniqueId) -> Self {
                Self(id)
            }

            /// Return the untyped identifier.
            #[must_use]
            pub const fn unique(self) -> UniqueId {
                self.0
            }

            /// Construct from raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
                Self(UniqueId::from_bytes(bytes))
            }

            /// Mint a fresh identifier from OS entropy.
            pub fn from_random() -> Result<Self> {
                UniqueId::from_random().map(Self)
            }

            /// Mint a fresh identifier from the given entropy source.
            pub fn from_entropy(source: &dyn EntropySource) -> Result<Self> {
                UniqueId::from_entropy(source).map(Self)
            }
        }

        impl From<UniqueId> for $name {
            fn from(id: UniqueId) -> Self {
                Self(id)
            }
        }

        impl From<$name> for UniqueId {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
                s.parse::<UniqueId>().map(Self).map_err(|e| ParseIdError {
                    kind: stringify!($name),
                    ..e
                })
            }
        }
    };
}

define_id!(
    /// Identifies a job (driver).
    JobId
);
define_id!(
    /// Identifies an immutable object in the object store.
    ObjectId
);
define_id!(
    /// Identifies a task.
    TaskId
);
define_id!(
    /// Identifies an actor.
    ActorId
);
define_id!(
    /// Identifies a remote class.
    ClassId
);
define_id!(
    /// Identifies a remote function.
    FunctionId
);
define_id!(
    /// Identifies a cluster node (client of the store).
    ///
    /// A client ID is retired on disconnect and never reused.
    ClientId
);
define_id!(
    /// Identifies a configuration entry.
    ConfigId
);
