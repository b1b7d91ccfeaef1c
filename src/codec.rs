//! Record encoding.
//!
//! Every table row is a schema-defined record. Records are encoded as
//! MessagePack maps with named fields, so adding an optional field to a
//! record does not break peers still running the previous schema.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Error produced while encoding or decoding a record.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The record could not be serialized.
    #[error("failed to encode {record}: {source}")]
    Encode {
        /// Schema name of the record.
        record: &'static str,
        /// Underlying serializer error.
        #[source]
        source: rmp_serde::encode::Error,
    },
    /// The bytes are not a valid encoding of the record.
    #[error("failed to decode {record}: {source}")]
    Decode {
        /// Schema name of the record.
        record: &'static str,
        /// Underlying deserializer error.
        #[source]
        source: rmp_serde::decode::Error,
    },
}

/// A schema-defined table record.
///
/// The default methods give a lossless round trip for every field; records
/// only need to name their schema.
pub trait Record: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Schema name used in diagnostics.
    const NAME: &'static str;

    /// Encodes the record for the store.
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(self).map_err(|source| CodecError::Encode {
            record: Self::NAME,
            source,
        })
    }

    /// Decodes a record previously produced by [`Record::encode`].
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        rmp_serde::from_slice(bytes).map_err(|source| CodecError::Decode {
            record: Self::NAME,
            source,
        })
    }
}
