//! `InitProducerId` request and response.
//!
//! Used by a transactional/idempotent producer to obtain (or bump the epoch
//! of) the producer id it stamps onto record batches.

use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    primitives::TaggedFields,
    traits::{ReadCompactType, ReadType, WriteCompactType, WriteType},
};

use super::{
    ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError, WriteVersionedType,
};

#[derive(Debug)]
pub struct InitProducerIdRequest {
    /// The transactional id, or None if the producer is not transactional.
    pub transactional_id: Option<String>,

    /// The time in ms to wait before aborting idle transactions sent by this producer.
    pub transaction_timeout_ms: i32,

    /// The producer id, or -1 if the producer does not have one yet.
    ///
    /// Added in version 3.
    pub producer_id: Option<i64>,

    /// The producer's current epoch, or -1 if the producer does not have one yet.
    ///
    /// Added in version 3.
    pub producer_epoch: Option<i16>,

    /// The tagged fields.
    ///
    /// Added in version 2.
    pub tagged_fields: Option<TaggedFields>,
}

impl<W> WriteVersionedType<W> for InitProducerIdRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;
        assert!(v <= 4);

        if v < 2 {
            self.transactional_id.write(writer)?;
        } else {
            match self.transactional_id.as_ref() {
                Some(id) => id.write_compact(writer)?,
                None => Option::<String>::None.write_compact(writer)?,
            }
        }

        self.transaction_timeout_ms.write(writer)?;

        if v >= 3 {
            self.producer_id.unwrap_or(-1).write(writer)?;
            self.producer_epoch.unwrap_or(-1).write(writer)?;
        }

        if v >= 2 {
            self.tagged_fields.write(writer)?;
        }

        Ok(())
    }
}

impl RequestBody for InitProducerIdRequest {
    type ResponseBody = InitProducerIdResponse;
    const API_KEY: ApiKey = ApiKey::InitProducerId;
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 4);
    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion = ApiVersion(2);
    const FIRST_TAGGED_FIELD_IN_RESPONSE_VERSION: ApiVersion = ApiVersion(2);
}

#[derive(Debug, PartialEq, Eq)]
pub struct InitProducerIdResponse {
    /// The duration in milliseconds for which the request was throttled due to a quota
    /// violation, or zero if the request did not violate any quota.
    pub throttle_time_ms: i32,

    /// The error code, or 0 if there was no error.
    pub error_code: Option<ApiError>,

    /// The current producer id.
    pub producer_id: i64,

    /// The current epoch associated with the producer id.
    pub producer_epoch: i16,

    /// The tagged fields.
    ///
    /// Added in version 2.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R> ReadVersionedType<R> for InitProducerIdResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;
        assert!(v <= 4);

        Ok(Self {
            throttle_time_ms: i32::read(reader)?,
            error_code: ApiError::new(i16::read(reader)?),
            producer_id: i64::read(reader)?,
            producer_epoch: i16::read(reader)?,
            tagged_fields: (v >= 2).then(|| TaggedFields::read(reader)).transpose()?,
        })
    }
}
