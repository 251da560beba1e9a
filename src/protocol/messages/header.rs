//! The request/response envelope every frame carries ahead of its body.

use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::ApiVersion,
    primitives::TaggedFields,
    traits::{ReadType, WriteType},
};

use super::{ReadVersionedError, ReadVersionedType, WriteVersionedError, WriteVersionedType};

/// Precedes every request body on the wire.
///
/// `client_id` arrived in header version 1, `tagged_fields` in version 2 --
/// the version here tracks the header format itself, independent of the
/// body's own `ApiVersion`.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct RequestHeader {
    pub request_api_key: ApiKey,
    pub request_api_version: ApiVersion,
    pub correlation_id: i32,
    pub client_id: Option<String>,
    pub tagged_fields: Option<TaggedFields>,
}

impl<R: Read> ReadVersionedType<R> for RequestHeader {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 2, "unknown request header version {}", version.0);

        let request_api_key = ApiKey::from(i16::read(reader)?);
        let request_api_version = ApiVersion(i16::read(reader)?);
        let correlation_id = i32::read(reader)?;
        let client_id = match version.0 {
            0 => None,
            _ => Option::<String>::read(reader)?,
        };
        let tagged_fields = match version.0 {
            v if v >= 2 => Some(TaggedFields::read(reader)?),
            _ => None,
        };

        Ok(Self {
            request_api_key,
            request_api_version,
            correlation_id,
            client_id,
            tagged_fields,
        })
    }
}

impl<W: Write> WriteVersionedType<W> for RequestHeader {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 2, "unknown request header version {}", version.0);

        i16::from(self.request_api_key).write(writer)?;
        self.request_api_version.0.write(writer)?;
        self.correlation_id.write(writer)?;

        if version.0 >= 1 {
            self.client_id.write(writer)?;
        }

        if version.0 >= 2 {
            self.tagged_fields.write(writer)?;
        }

        Ok(())
    }
}

/// Precedes every response body. Plain `correlation_id` echo, plus tagged
/// fields from version 1 on.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ResponseHeader {
    pub correlation_id: i32,
    pub tagged_fields: Option<TaggedFields>,
}

impl<R: Read> ReadVersionedType<R> for ResponseHeader {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 1, "unknown response header version {}", version.0);

        Ok(Self {
            correlation_id: i32::read(reader)?,
            tagged_fields: match version.0 {
                1 => Some(TaggedFields::read(reader)?),
                _ => None,
            },
        })
    }
}

// Encoding a response header is never needed in production -- kaskade is a
// client, not a broker -- but it lets tests round-trip fixtures.
impl<W: Write> WriteVersionedType<W> for ResponseHeader {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 1, "unknown response header version {}", version.0);

        self.correlation_id.write(writer)?;

        if version.0 >= 1 {
            self.tagged_fields.write(writer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::messages::test_utils::test_roundtrip_versioned;

    use super::*;

    test_roundtrip_versioned!(RequestHeader, ApiVersion(0), ApiVersion(2), test_roundtrip_request_header);
    test_roundtrip_versioned!(ResponseHeader, ApiVersion(0), ApiVersion(1), test_roundtrip_response_header);
}
