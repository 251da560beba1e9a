//! `SaslHandshake` and `SaslAuthenticate`: the two requests that make up a
//! SASL login exchange before any other API call is allowed on a connection.

use std::io::{Read, Write};

use super::{ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError, WriteVersionedType};
use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    primitives::TaggedFields,
    traits::{ReadCompactType, ReadType, WriteCompactType, WriteType},
};

#[derive(Debug)]
pub struct SaslHandshakeRequest {
    /// The mechanism name the client picked, e.g. `"PLAIN"`.
    pub mechanism: String,
}

impl SaslHandshakeRequest {
    pub fn new(mechanism: &str) -> Self {
        Self { mechanism: mechanism.to_string() }
    }
}

impl<R: Read> ReadVersionedType<R> for SaslHandshakeRequest {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert_eq!(version.0, 1);
        Ok(Self { mechanism: String::read(reader)? })
    }
}

impl<W: Write> WriteVersionedType<W> for SaslHandshakeRequest {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert_eq!(version.0, 1);
        self.mechanism.write(writer)?;
        Ok(())
    }
}

impl RequestBody for SaslHandshakeRequest {
    type ResponseBody = SaslHandshakeResponse;
    const API_KEY: ApiKey = ApiKey::SaslHandshake;
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(1, 1);
    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion = ApiVersion(3);
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct SaslHandshakeResponse {
    pub error_code: Option<ApiError>,
    /// The mechanisms the broker will accept.
    pub mechanisms: Vec<String>,
}

impl<R: Read> ReadVersionedType<R> for SaslHandshakeResponse {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert_eq!(version.0, 1);
        Ok(Self {
            error_code: ApiError::new(i16::read(reader)?),
            mechanisms: Vec::<String>::read(reader)?,
        })
    }
}

// Never sent by a client; only here so the round-trip test harness can
// build fixtures for read_versioned.
impl<W: Write> WriteVersionedType<W> for SaslHandshakeResponse {
    fn write_versioned(&self, _writer: &mut W, _version: ApiVersion) -> Result<(), WriteVersionedError> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct SaslAuthenticateRequest {
    /// Opaque bytes defined by whichever mechanism `SaslHandshake` settled
    /// on. `Vec<u8>` below version 2, `CompactBytes` at version 2.
    pub auth_bytes: Vec<u8>,
    /// Added in version 2.
    pub tagged_fields: Option<TaggedFields>,
}

impl SaslAuthenticateRequest {
    pub fn new(auth_bytes: Vec<u8>) -> Self {
        Self { auth_bytes, tagged_fields: Some(TaggedFields::default()) }
    }
}

impl<R: Read> ReadVersionedType<R> for SaslAuthenticateRequest {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 2);
        if version.0 <= 1 {
            return Ok(Self::new(Vec::<u8>::read(reader)?));
        }

        Ok(Self {
            auth_bytes: Vec::<u8>::read_compact(reader)?,
            tagged_fields: Some(TaggedFields::read(reader)?),
        })
    }
}

impl<W: Write> WriteVersionedType<W> for SaslAuthenticateRequest {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 2);
        if version.0 <= 1 {
            return Ok(self.auth_bytes.write(writer)?);
        }

        self.auth_bytes.write_compact(writer)?;
        self.tagged_fields.write(writer)?;
        Ok(())
    }
}

impl RequestBody for SaslAuthenticateRequest {
    type ResponseBody = SaslAuthenticateResponse;
    const API_KEY: ApiKey = ApiKey::SaslAuthenticate;
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 2);
    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion = ApiVersion(2);
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct SaslAuthenticateResponse {
    pub error_code: Option<ApiError>,
    /// `NULLABLE_STRING` below version 2, `COMPACT_NULLABLE_STRING` at 2.
    pub error_message: Option<String>,
    /// `Vec<u8>` below version 2, `CompactBytes` at version 2.
    pub auth_bytes: Vec<u8>,
    /// Added in version 1.
    pub session_lifetime_ms: Option<i64>,
    /// Added in version 2.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R: Read> ReadVersionedType<R> for SaslAuthenticateResponse {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;
        assert!(v <= 2);

        let error_code = ApiError::new(i16::read(reader)?);
        let (error_message, auth_bytes) = if v <= 1 {
            (Option::<String>::read(reader)?, Vec::<u8>::read(reader)?)
        } else {
            (Option::<String>::read_compact(reader)?, Vec::<u8>::read_compact(reader)?)
        };
        let session_lifetime_ms = if v >= 1 { Some(i64::read(reader)?) } else { None };
        let tagged_fields = if v >= 2 { Some(TaggedFields::read(reader)?) } else { None };

        Ok(Self {
            error_code,
            error_message,
            auth_bytes,
            session_lifetime_ms,
            tagged_fields,
        })
    }
}

impl<W: Write> WriteVersionedType<W> for SaslAuthenticateResponse {
    fn write_versioned(&self, _writer: &mut W, _version: ApiVersion) -> Result<(), WriteVersionedError> {
        Ok(())
    }
}
