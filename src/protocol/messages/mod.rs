//! Per-message, per-version (de)serialization.
//!
//! Unlike the plain [`ReadType`](super::traits::ReadType)/[`WriteType`](super::traits::WriteType)
//! traits used for primitives, every request/response body is threaded through an
//! [`ApiVersion`] so that a single struct can encode/decode every wire shape a broker
//! might speak.

use std::io::{Read, Write};

use thiserror::Error;

use super::api_key::ApiKey;
use super::api_version::{ApiVersion, ApiVersionRange};
use super::traits::{ReadError, WriteError};

pub mod alter_partition_reassignments;
pub mod api_versions;
pub mod describe_user_scram_credentials;
pub mod fetch;
pub mod find_coordinator;
pub mod header;
pub mod init_producer_id;
pub mod list_offsets;
pub mod metadata;
pub mod sasl;

#[cfg(test)]
pub(crate) mod test_utils;

pub use alter_partition_reassignments::*;
pub use api_versions::*;
pub use describe_user_scram_credentials::*;
pub use fetch::*;
pub use find_coordinator::*;
pub use header::*;
pub use init_producer_id::*;
pub use list_offsets::*;
pub use metadata::*;
pub use sasl::*;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReadVersionedError {
    #[error(transparent)]
    Read(#[from] ReadError),
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WriteVersionedError {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("field not available in version {version:?}: {field}")]
    FieldNotAvailable { version: ApiVersion, field: String },
}

/// Reads a message body for a specific [`ApiVersion`].
pub trait ReadVersionedType<R>: Sized
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError>;
}

/// Writes a message body for a specific [`ApiVersion`].
pub trait WriteVersionedType<W>: Sized
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError>;
}

/// Binds a request type to its response type and the API metadata needed to
/// pick a mutually-supported version and know when tagged fields kick in.
pub trait RequestBody {
    type ResponseBody;

    const API_KEY: ApiKey;

    const API_VERSION_RANGE: ApiVersionRange;

    /// The first request version that carries a trailing tagged-field block.
    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion;

    /// The first response version that carries a trailing tagged-field block.
    ///
    /// Defaults to "never" for request types whose response never grew tagged
    /// fields.
    const FIRST_TAGGED_FIELD_IN_RESPONSE_VERSION: ApiVersion = ApiVersion(i16::MAX);
}

/// This setting controls the visibility of transactional records.
///
/// Using `ReadUncommitted` makes all records visible. With `ReadCommitted`, non-transactional
/// and `COMMITTED` transactional records are visible. To be more concrete, `ReadCommitted`
/// returns all data from offsets smaller than the current LSO (last stable offset), and enables
/// the inclusion of the list of aborted transactions in the result, which allows consumers to
/// discard `ABORTED` transactional records.
///
/// As per [KIP-98] the default is `ReadUncommitted`.
///
/// [KIP-98]: https://cwiki.apache.org/confluence/display/KAFKA/KIP-98+-+Exactly+Once+Delivery+and+Transactional+Messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum IsolationLevel {
    #[default]
    ReadUncommitted,
    ReadCommitted,
}

impl From<IsolationLevel> for i8 {
    fn from(level: IsolationLevel) -> Self {
        match level {
            IsolationLevel::ReadUncommitted => 0,
            IsolationLevel::ReadCommitted => 1,
        }
    }
}

/// Reads a classic (INT32-length-prefixed) array of versioned elements.
///
/// A length of `-1` is a null array, represented here as `None`.
pub fn read_versioned_array<R, T>(
    reader: &mut R,
    version: ApiVersion,
) -> Result<Option<Vec<T>>, ReadVersionedError>
where
    R: Read,
    T: ReadVersionedType<R>,
{
    use super::traits::ReadType;
    use super::vec_builder::VecBuilder;

    let len = i32::read(reader)?;
    if len == -1 {
        return Ok(None);
    }

    let len = usize::try_from(len).map_err(ReadError::Overflow)?;
    let mut res = VecBuilder::new(len);
    for _ in 0..len {
        res.push(T::read_versioned(reader, version)?);
    }

    Ok(Some(res.into()))
}

/// Writes a classic (INT32-length-prefixed) array of versioned elements.
///
/// `None` is written as a length of `-1`.
pub fn write_versioned_array<W, T>(
    writer: &mut W,
    version: ApiVersion,
    values: Option<&[T]>,
) -> Result<(), WriteVersionedError>
where
    W: Write,
    T: WriteVersionedType<W>,
{
    use super::traits::WriteType;

    match values {
        None => {
            (-1i32).write(writer)?;
        }
        Some(values) => {
            let len = i32::try_from(values.len()).map_err(WriteError::Overflow)?;
            len.write(writer)?;

            for value in values {
                value.write_versioned(writer, version)?;
            }
        }
    }

    Ok(())
}

/// Reads a compact (unsigned-varint-length-prefixed, offset by one) array of
/// versioned elements.
pub fn read_compact_versioned_array<R, T>(
    reader: &mut R,
    version: ApiVersion,
) -> Result<Option<Vec<T>>, ReadVersionedError>
where
    R: Read,
    T: ReadVersionedType<R>,
{
    use super::primitives::UnsignedVarint;
    use super::traits::ReadType;
    use super::vec_builder::VecBuilder;

    let len = UnsignedVarint::read(reader)?.0;
    if len == 0 {
        return Ok(None);
    }

    let len = usize::try_from(len - 1).map_err(ReadError::Overflow)?;
    let mut res = VecBuilder::new(len);
    for _ in 0..len {
        res.push(T::read_versioned(reader, version)?);
    }

    Ok(Some(res.into()))
}

/// Writes a compact (unsigned-varint-length-prefixed, offset by one) array of
/// versioned elements.
pub fn write_compact_versioned_array<W, T>(
    writer: &mut W,
    version: ApiVersion,
    values: Option<&[T]>,
) -> Result<(), WriteVersionedError>
where
    W: Write,
    T: WriteVersionedType<W>,
{
    use super::primitives::UnsignedVarint;
    use super::traits::WriteType;

    match values {
        None => {
            UnsignedVarint(0).write(writer)?;
        }
        Some(values) => {
            let len = u64::try_from(values.len()).map_err(WriteError::Overflow)?;
            UnsignedVarint(len + 1).write(writer)?;

            for value in values {
                value.write_versioned(writer, version)?;
            }
        }
    }

    Ok(())
}
