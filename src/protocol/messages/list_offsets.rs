//! `ListOffsets`: resolves a timestamp (or the special "earliest"/"latest"
//! markers) to a partition offset.
//!
//! # References
//! - [KIP-79](https://cwiki.apache.org/confluence/pages/viewpage.action?pageId=65868090)
//! - [KIP-98](https://cwiki.apache.org/confluence/display/KAFKA/KIP-98+-+Exactly+Once+Delivery+and+Transactional+Messaging)

use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    messages::{read_versioned_array, write_versioned_array, IsolationLevel},
    traits::{ReadType, WriteType},
};

use super::{ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError, WriteVersionedType};

#[derive(Debug)]
#[allow(missing_copy_implementations)]
pub struct ListOffsetsRequestPartition {
    pub partition_index: i32,

    /// Per [KIP-79], `-1` asks for the latest offset and `-2` the earliest;
    /// any other value is a real point in time. Version 0 returns up to
    /// `max_num_offsets` offsets at or before this timestamp; version 1+
    /// returns the single offset of the first record at or after it.
    ///
    /// [KIP-79]: https://cwiki.apache.org/confluence/pages/viewpage.action?pageId=65868090
    pub timestamp: i64,

    /// Removed in version 1. Defaults to 1 on the wire.
    pub max_num_offsets: Option<i32>,
}

impl<W: Write> WriteVersionedType<W> for ListOffsetsRequestPartition {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        self.partition_index.write(writer)?;
        self.timestamp.write(writer)?;

        if version.0 == 0 {
            self.max_num_offsets.unwrap_or(1).write(writer)?;
        }

        Ok(())
    }
}

/// A topic's partitions in a `ListOffsets` request. Each partition name may
/// only appear once.
#[derive(Debug)]
pub struct ListOffsetsRequestTopic {
    pub name: String,
    pub partitions: Vec<ListOffsetsRequestPartition>,
}

impl<W: Write> WriteVersionedType<W> for ListOffsetsRequestTopic {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        self.name.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))
    }
}

#[derive(Debug)]
pub struct ListOffsetsRequest {
    /// The requesting broker's id, or `-1` for an ordinary consumer.
    pub replica_id: i32,

    /// `READ_UNCOMMITTED` (the default) returns every record; `READ_COMMITTED`
    /// hides records from transactions that haven't committed yet, per
    /// [KIP-98]. Added in version 2.
    ///
    /// [KIP-98]: https://cwiki.apache.org/confluence/display/KAFKA/KIP-98+-+Exactly+Once+Delivery+and+Transactional+Messaging
    pub isolation_level: Option<IsolationLevel>,

    /// Each topic to resolve. A topic name may only appear once.
    pub topics: Vec<ListOffsetsRequestTopic>,
}

impl<W: Write> WriteVersionedType<W> for ListOffsetsRequest {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        self.replica_id.write(writer)?;

        if version.0 >= 2 {
            i8::from(self.isolation_level.unwrap_or_default()).write(writer)?;
        }

        write_versioned_array(writer, version, Some(&self.topics))
    }
}

impl RequestBody for ListOffsetsRequest {
    type ResponseBody = ListOffsetsResponse;
    const API_KEY: ApiKey = ApiKey::ListOffsets;
    /// Matches the subset rdkafka supports as of this writing.
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 3);
    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion = ApiVersion(6);
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ListOffsetsResponsePartition {
    pub partition_index: i32,
    pub error_code: Option<ApiError>,
    /// Removed in version 1.
    pub old_style_offsets: Option<Vec<i64>>,
    /// Added in version 1.
    pub timestamp: Option<i64>,
    /// Added in version 1.
    pub offset: Option<i64>,
}

impl<R: Read> ReadVersionedType<R> for ListOffsetsResponsePartition {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;
        assert!(v <= 3);

        let partition_index = i32::read(reader)?;
        let error_code = ApiError::new(i16::read(reader)?);
        let old_style_offsets = if v < 1 { Some(Vec::<i64>::read(reader)?) } else { None };
        let (timestamp, offset) = if v >= 1 {
            (Some(i64::read(reader)?), Some(i64::read(reader)?))
        } else {
            (None, None)
        };

        Ok(Self {
            partition_index,
            error_code,
            old_style_offsets,
            timestamp,
            offset,
        })
    }
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ListOffsetsResponseTopic {
    pub name: String,
    pub partitions: Vec<ListOffsetsResponsePartition>,
}

impl<R: Read> ReadVersionedType<R> for ListOffsetsResponseTopic {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 3);

        Ok(Self {
            name: String::read(reader)?,
            partitions: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ListOffsetsResponse {
    /// Added in version 2.
    pub throttle_time_ms: Option<i32>,
    pub topics: Vec<ListOffsetsResponseTopic>,
}

impl<R: Read> ReadVersionedType<R> for ListOffsetsResponse {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 3);

        let throttle_time_ms = if version.0 >= 2 { Some(i32::read(reader)?) } else { None };
        let topics = read_versioned_array(reader, version)?.unwrap_or_default();

        Ok(Self { throttle_time_ms, topics })
    }
}
