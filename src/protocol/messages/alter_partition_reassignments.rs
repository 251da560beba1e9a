//! `AlterPartitionReassignments` request and response.
//!
//! Flexible-only since its introduction (KIP-455); every version uses compact
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
pub struct AlterPartitionReassignmentsRequestPartition {
    /// The partition index.
    pub partition_index: i32,

    /// The set of replicas the partition should be reassigned to, or `None` to cancel a
    /// pending reassignment for this partition.
    pub replicas: Option<Vec<i32>>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<W> WriteVersionedType<W> for AlterPartitionReassignmentsRequestPartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        _version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        self.partition_index.write(writer)?;

        match self.replicas.as_ref() {
            Some(replicas) => replicas.write_compact(writer)?,
            None => Vec::<i32>::new().write_compact(writer)?,
        }

        self.tagged_fields.write(writer)?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct AlterPartitionReassignmentsRequestTopic {
    /// The topic name.
    pub name: String,

    /// The partitions to reassign.
    pub partitions: Vec<AlterPartitionReassignmentsRequestPartition>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<W> WriteVersionedType<W> for AlterPartitionReassignmentsRequestTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        self.name.write_compact(writer)?;
        write_compact_versioned_array(writer, version, Some(&self.partitions))?;
        self.tagged_fields.write(writer)?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct AlterPartitionReassignmentsRequest {
    /// The time in ms to wait for the request to complete.
    pub timeout_ms: i32,

    /// The topics to reassign.
    pub topics: Vec<AlterPartitionReassignmentsRequestTopic>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<W> WriteVersionedType<W> for AlterPartitionReassignmentsRequest
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

        self.timeout_ms.write(writer)?;
        write_compact_versioned_array(writer, version, Some(&self.topics))?;
        self.tagged_fields.write(writer)?;

        Ok(())
    }
}

impl RequestBody for AlterPartitionReassignmentsRequest {
    type ResponseBody = AlterPartitionReassignmentsResponse;
    const API_KEY: ApiKey = ApiKey::AlterPartitionReassignments;
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 0);
    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion = ApiVersion(0);
    const FIRST_TAGGED_FIELD_IN_RESPONSE_VERSION: ApiVersion = ApiVersion(0);
}

#[derive(Debug, PartialEq, Eq)]
pub struct AlterPartitionReassignmentsResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The error code, or 0 if there was no error.
    pub error_code: Option<ApiError>,

    /// The error message, or `None` if there was no error.
    pub error_message: Option<String>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R> ReadVersionedType<R> for AlterPartitionReassignmentsResponsePartition
where
    R: Read,
{
    fn read_versioned(reader: &mut R, _version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            partition_index: i32::read(reader)?,
            error_code: ApiError::new(i16::read(reader)?),
            error_message: Option::<String>::read_compact(reader)?,
            tagged_fields: Some(TaggedFields::read(reader)?),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct AlterPartitionReassignmentsResponseTopic {
    /// The topic name.
    pub name: String,

    /// The results for each partition.
    pub partitions: Vec<AlterPartitionReassignmentsResponsePartition>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R> ReadVersionedType<R> for AlterPartitionReassignmentsResponseTopic
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            name: String::read_compact(reader)?,
            partitions: read_compact_versioned_array(reader, version)?.unwrap_or_default(),
            tagged_fields: Some(TaggedFields::read(reader)?),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct AlterPartitionReassignmentsResponse {
    /// The duration in milliseconds for which the request was throttled due to a quota
    /// violation, or zero if the request did not violate any quota.
    pub throttle_time_ms: i32,

    /// The top-level error code, or 0 if there was no error.
    pub error_code: Option<ApiError>,

    /// The top-level error message, or `None` if there was no error.
    pub error_message: Option<String>,

    /// The responses for each topic.
    pub responses: Vec<AlterPartitionReassignmentsResponseTopic>,

    /// The tagged fields.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R> ReadVersionedType<R> for AlterPartitionReassignmentsResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            throttle_time_ms: i32::read(reader)?,
            error_code: ApiError::new(i16::read(reader)?),
            error_message: Option::<String>::read_compact(reader)?,
            responses: read_compact_versioned_array(reader, version)?.unwrap_or_default(),
            tagged_fields: Some(TaggedFields::read(reader)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn request() {
        for (name, version, req, want) in [(
            "cancel a pending reassignment",
            0,
            AlterPartitionReassignmentsRequest {
                timeout_ms: 1000,
                topics: vec![AlterPartitionReassignmentsRequestTopic {
                    name: "topic".to_string(),
                    partitions: vec![AlterPartitionReassignmentsRequestPartition {
                        partition_index: 0,
                        replicas: None,
                        tagged_fields: None,
                    }],
                    tagged_fields: None,
                }],
                tagged_fields: None,
            },
            [
                0x00, 0x00, 0x03, 0xe8, // timeout
                0x02, // topics len (1 + 1)
                0x06, b't', b'o', b'p', b'i', b'c', // topic name
                0x02, // partitions len (1 + 1)
                0x00, 0x00, 0x00, 0x00, // partition index
                0x00, // replicas: empty compact array
                0x00, // partition tagged fields
                0x00, // topic tagged fields
                0x00, // request tagged fields
            ]
            .as_ref(),
        )] {
            let mut buf = Cursor::new([0u8; 128]);
            req.write_versioned(&mut buf, ApiVersion(version)).unwrap();
            let len = buf.position() as usize;
            let got = &buf.get_ref().as_slice()[..len];
            assert_eq!(got, want, "{name}/{version}");
        }
    }
}
