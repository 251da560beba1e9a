//! `DescribeUserScramCredentials` request and response.
//!
//! Flexible-only since its introduction (KIP-554); every version uses compact
//! framing and a trailing tagged-field block.

use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    messages::{read_compact_versioned_array, write_compact_versioned_array},
    primitives::TaggedFields,
    traits::{ReadCompactType, ReadType, WriteCompactType, WriteType},
};

use super::{
    ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError, WriteVersionedType,
};

#[derive(Debug)]
pub struct DescribeUserScramCredentialsRequestUser {
    /// The user name.
    pub name: String,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<W> WriteVersionedType<W> for DescribeUserScramCredentialsRequestUser
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        _version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        self.name.write_compact(writer)?;
        self.tagged_fields.write(writer)?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct DescribeUserScramCredentialsRequest {
    /// The users to describe, or `None` to describe all users.
    pub users: Option<Vec<DescribeUserScramCredentialsRequestUser>>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<W> WriteVersionedType<W> for DescribeUserScramCredentialsRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;
        assert!(v == 0);

        write_compact_versioned_array(writer, version, self.users.as_deref())?;
        self.tagged_fields.write(writer)?;

        Ok(())
    }
}

impl RequestBody for DescribeUserScramCredentialsRequest {
    type ResponseBody = DescribeUserScramCredentialsResponse;
    const API_KEY: ApiKey = ApiKey::DescribeUserScramCredentials;
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 0);
    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion = ApiVersion(0);
    const FIRST_TAGGED_FIELD_IN_RESPONSE_VERSION: ApiVersion = ApiVersion(0);
}

#[derive(Debug, PartialEq, Eq)]
pub struct CredentialInfo {
    /// The SCRAM mechanism.
    pub mechanism: i8,

    /// The number of iterations used in the SCRAM credential.
    pub iterations: i32,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R> ReadVersionedType<R> for CredentialInfo
where
    R: Read,
{
    fn read_versioned(reader: &mut R, _version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            mechanism: i8::read(reader)?,
            iterations: i32::read(reader)?,
            tagged_fields: Some(TaggedFields::read(reader)?),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DescribeUserScramCredentialsResponseResult {
    /// The user name.
    pub user: String,

    /// The error code, or 0 if there was no error.
    pub error_code: Option<ApiError>,

    /// The error message, or `None` if there was no error.
    pub error_message: Option<String>,

    /// The mechanisms and iteration counts for the user's stored SCRAM credentials.
    pub credential_infos: Vec<CredentialInfo>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R> ReadVersionedType<R> for DescribeUserScramCredentialsResponseResult
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            user: String::read_compact(reader)?,
            error_code: ApiError::new(i16::read(reader)?),
            error_message: Option::<String>::read_compact(reader)?,
            credential_infos: read_compact_versioned_array(reader, version)?.unwrap_or_default(),
            tagged_fields: Some(TaggedFields::read(reader)?),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DescribeUserScramCredentialsResponse {
    /// The duration in milliseconds for which the request was throttled due to a quota
    /// violation, or zero if the request did not violate any quota.
    pub throttle_time_ms: i32,

    /// The top-level error code, or 0 if there was no error.
    pub error_code: Option<ApiError>,

    /// The top-level error message, or `None` if there was no error.
    pub error_message: Option<String>,

    /// The per-user results.
    pub results: Vec<DescribeUserScramCredentialsResponseResult>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R> ReadVersionedType<R> for DescribeUserScramCredentialsResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            throttle_time_ms: i32::read(reader)?,
            error_code: ApiError::new(i16::read(reader)?),
            error_message: Option::<String>::read_compact(reader)?,
            results: read_compact_versioned_array(reader, version)?.unwrap_or_default(),
            tagged_fields: Some(TaggedFields::read(reader)?),
        })
    }
}
