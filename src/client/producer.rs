//! Minimal produce path: batches records and sends them to the partition's
//! current leader.
//!
//! The Produce request/response shapes are not part of the protocol's
//! per-version message catalog (unlike `Metadata`/`Fetch`/`ListOffsets`) --
//! they are a single, fixed-version wire shape encoded directly against the
//! primitive and record-batch codecs, since a producer is an edge
//! collaborator rather than a core module. [`Writer`] reuses
//! `client::partition::PartitionClient` for leader resolution/caching and
//! its retry-with-invalidation policy, so the only thing unique to this
//! module is the record batch assembly and the produce wire shape itself.

use std::io::{Read, Write as IoWrite};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::backoff::{BackoffConfig, ErrorOrThrottle};
use crate::client::error::{Error, RequestContext, Result};
use crate::client::partition::{PartitionClient, UnknownTopicHandling, maybe_retry};
use crate::connection::{BrokerCache, BrokerConnector};
use crate::protocol::api_key::ApiKey;
use crate::protocol::api_version::{ApiVersion, ApiVersionRange};
use crate::protocol::error::Error as ApiError;
use crate::protocol::messages::{
    ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError, WriteVersionedType,
};
use crate::protocol::primitives::Records;
use crate::protocol::record::{
    ControlBatchOrRecords, Record, RecordBatch, RecordBatchCompression, RecordBatchTimestampType,
    RecordHeader,
};
use crate::protocol::traits::{ReadError, ReadType, WriteError, WriteType};
use crate::throttle::maybe_throttle;
use crate::validation::ExactlyOne;

const PRODUCE_API_VERSION: ApiVersion = ApiVersion(3);

/// Acknowledgement mode, mirrors `acks` on the real Kafka produce API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acks {
    /// Do not wait for any acknowledgement.
    None,
    /// Wait for the leader to write the record to its local log.
    Leader,
    /// Wait for the full in-sync replica set to acknowledge.
    All,
}

impl From<Acks> for i16 {
    fn from(acks: Acks) -> Self {
        match acks {
            Acks::None => 0,
            Acks::Leader => 1,
            Acks::All => -1,
        }
    }
}

/// One record to be produced, analogous to [`crate::client::partition::RecordAndOffset`]
/// on the read side but without an offset: the broker assigns it.
#[derive(Debug, Clone)]
pub struct ProducerRecord {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<RecordHeader>,
}

impl ProducerRecord {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: None,
            value: Some(value.into()),
            headers: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Builder for [`Writer`].
pub struct WriterBuilder {
    brokers: Arc<BrokerConnector>,
    topic: String,
    partition: i32,
    acks: Acks,
    timeout: Duration,
    backoff_config: Arc<BackoffConfig>,
}

impl WriterBuilder {
    fn new(brokers: Arc<BrokerConnector>, topic: impl Into<String>) -> Self {
        Self {
            brokers,
            topic: topic.into(),
            partition: 0,
            acks: Acks::All,
            timeout: Duration::from_secs(30),
            backoff_config: Default::default(),
        }
    }

    /// Target partition. Defaults to `0`.
    pub fn partition(mut self, partition: i32) -> Self {
        self.partition = partition;
        self
    }

    /// Acknowledgement mode required before a produce call returns. Defaults
    /// to [`Acks::All`].
    pub fn acks(mut self, acks: Acks) -> Self {
        self.acks = acks;
        self
    }

    /// Broker-side timeout for the acks to be satisfied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backoff_config(mut self, backoff_config: BackoffConfig) -> Self {
        self.backoff_config = Arc::new(backoff_config);
        self
    }

    pub async fn build(self) -> Result<Writer> {
        let client = PartitionClient::new(
            self.topic,
            self.partition,
            Arc::clone(&self.brokers),
            UnknownTopicHandling::Error,
            Arc::clone(&self.backoff_config),
        )
        .await?;

        Ok(Writer {
            client,
            acks: self.acks,
            timeout_ms: i32::try_from(self.timeout.as_millis()).unwrap_or(i32::MAX),
            backoff_config: self.backoff_config,
        })
    }
}

/// Produces records to one partition's current leader.
///
/// Construct via [`Writer::new`]. Closing is a plain drop: there is no
/// background task to tear down, unlike [`crate::client::partition::Reader`].
pub struct Writer {
    client: PartitionClient,
    acks: Acks,
    timeout_ms: i32,
    backoff_config: Arc<BackoffConfig>,
}

impl Writer {
    /// Starts building a [`Writer`] for `topic`, defaulting to partition 0.
    pub fn new(brokers: Arc<BrokerConnector>, topic: impl Into<String>) -> WriterBuilder {
        WriterBuilder::new(brokers, topic)
    }

    /// Batches `records` into a single record batch and writes it to the
    /// partition leader, retrying on a stale/broken leader connection.
    pub async fn write_messages(&self, records: Vec<ProducerRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);

        let batch_records: Vec<Record> = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| Record {
                offset: i as i64,
                timestamp: now_ms,
                key: record.key,
                value: record.value,
                headers: record.headers,
            })
            .collect();
        let last_offset_delta = i32::try_from(batch_records.len() - 1).unwrap_or(0);

        let batch = RecordBatch {
            base_offset: 0,
            partition_leader_epoch: -1,
            last_offset_delta,
            first_timestamp: now_ms,
            max_timestamp: now_ms,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records: ControlBatchOrRecords::Records(batch_records),
            compression: RecordBatchCompression::NoCompression,
            is_transactional: false,
            timestamp_type: RecordBatchTimestampType::CreateTime,
        };

        let request = &ProduceRequest {
            acks: self.acks.into(),
            timeout_ms: self.timeout_ms,
            topic_data: vec![ProduceRequestTopic {
                name: self.client.topic().to_owned(),
                partition_data: vec![ProduceRequestPartition {
                    index: self.client.partition(),
                    records: Records(vec![batch]),
                }],
            }],
        };

        maybe_retry(&self.backoff_config, &self.client, "produce", || async move {
            let (broker, gen) = (&self.client)
                .get()
                .await
                .map_err(|e| ErrorOrThrottle::Error((e, None)))?;
            let response = broker
                .request(request)
                .await
                .map_err(|e| ErrorOrThrottle::Error((e.into(), Some(gen))))?;

            maybe_throttle(Some(response.throttle_time_ms))?;

            let topic = response.responses.exactly_one().map_err(|e| {
                ErrorOrThrottle::Error((
                    Error::exactly_one(RequestContext::Topic(self.client.topic().to_owned()), e),
                    Some(gen),
                ))
            })?;
            let partition = topic.partition_responses.exactly_one().map_err(|e| {
                ErrorOrThrottle::Error((
                    Error::exactly_one(
                        RequestContext::Partition(
                            self.client.topic().to_owned(),
                            self.client.partition(),
                        ),
                        e,
                    ),
                    Some(gen),
                ))
            })?;

            if let Some(protocol_error) = partition.error_code {
                return Err(ErrorOrThrottle::Error((
                    Error::ServerError {
                        protocol_error,
                        error_message: None,
                        request: RequestContext::Partition(
                            self.client.topic().to_owned(),
                            self.client.partition(),
                        ),
                        is_virtual: false,
                    },
                    Some(gen),
                )));
            }

            Ok(())
        })
        .await
    }

    /// Releases the cached leader connection. There is no background task
    /// to join, so this is synchronous and infallible.
    pub fn close(self) {
        debug!(
            topic = self.client.topic(),
            partition = self.client.partition(),
            "closing writer"
        );
    }
}

#[derive(Debug)]
struct ProduceRequest {
    acks: i16,
    timeout_ms: i32,
    topic_data: Vec<ProduceRequestTopic>,
}

#[derive(Debug)]
struct ProduceRequestTopic {
    name: String,
    partition_data: Vec<ProduceRequestPartition>,
}

#[derive(Debug)]
struct ProduceRequestPartition {
    index: i32,
    records: Records,
}

impl RequestBody for ProduceRequest {
    type ResponseBody = ProduceResponse;

    const API_KEY: ApiKey = ApiKey::Produce;

    // Only v3 (no transactional markers beyond the always-absent
    // `transactional_id`, `base_offset`-only partition responses) is
    // implemented; this client never negotiates a different version.
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(3, 3);

    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion = ApiVersion(9);
}

impl<W> WriteVersionedType<W> for ProduceRequest
where
    W: IoWrite,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert_eq!(version, PRODUCE_API_VERSION);

        Option::<String>::None.write(writer)?; // transactional_id
        self.acks.write(writer)?;
        self.timeout_ms.write(writer)?;

        let topic_count =
            i32::try_from(self.topic_data.len()).map_err(WriteError::Overflow)?;
        topic_count.write(writer)?;
        for topic in &self.topic_data {
            topic.name.write(writer)?;

            let partition_count =
                i32::try_from(topic.partition_data.len()).map_err(WriteError::Overflow)?;
            partition_count.write(writer)?;
            for partition in &topic.partition_data {
                partition.index.write(writer)?;
                partition.records.write(writer)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
struct ProduceResponse {
    responses: Vec<ProduceResponseTopic>,
    throttle_time_ms: i32,
}

#[derive(Debug)]
struct ProduceResponseTopic {
    #[allow(dead_code)]
    name: String,
    partition_responses: Vec<ProduceResponsePartition>,
}

#[derive(Debug)]
struct ProduceResponsePartition {
    #[allow(dead_code)]
    index: i32,
    error_code: Option<ApiError>,
    #[allow(dead_code)]
    base_offset: i64,
}

impl<R> ReadVersionedType<R> for ProduceResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert_eq!(version, PRODUCE_API_VERSION);

        let topic_count = usize::try_from(i32::read(reader)?).map_err(ReadError::Overflow)?;
        let mut responses = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            let name = String::read(reader)?;

            let partition_count =
                usize::try_from(i32::read(reader)?).map_err(ReadError::Overflow)?;
            let mut partition_responses = Vec::with_capacity(partition_count);
            for _ in 0..partition_count {
                let index = i32::read(reader)?;
                let error_code = ApiError::new(i16::read(reader)?);
                let base_offset = i64::read(reader)?;
                partition_responses.push(ProduceResponsePartition {
                    index,
                    error_code,
                    base_offset,
                });
            }

            responses.push(ProduceResponseTopic {
                name,
                partition_responses,
            });
        }
        let throttle_time_ms = i32::read(reader)?;

        Ok(Self {
            responses,
            throttle_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn acks_maps_to_the_wire_values() {
        assert_eq!(i16::from(Acks::None), 0);
        assert_eq!(i16::from(Acks::Leader), 1);
        assert_eq!(i16::from(Acks::All), -1);
    }

    #[test]
    fn request_round_trips_through_the_wire() {
        let req = ProduceRequest {
            acks: -1,
            timeout_ms: 30_000,
            topic_data: vec![ProduceRequestTopic {
                name: "orders".to_string(),
                partition_data: vec![ProduceRequestPartition {
                    index: 0,
                    records: Records(vec![RecordBatch {
                        base_offset: 0,
                        partition_leader_epoch: -1,
                        last_offset_delta: 0,
                        first_timestamp: 1_700_000_000_000,
                        max_timestamp: 1_700_000_000_000,
                        producer_id: -1,
                        producer_epoch: -1,
                        base_sequence: -1,
                        records: ControlBatchOrRecords::Records(vec![Record {
                            offset: 0,
                            timestamp: 1_700_000_000_000,
                            key: None,
                            value: Some(b"hello".to_vec()),
                            headers: Vec::new(),
                        }]),
                        compression: RecordBatchCompression::NoCompression,
                        is_transactional: false,
                        timestamp_type: RecordBatchTimestampType::CreateTime,
                    }]),
                }],
            }],
        };

        let mut buf = Vec::new();
        req.write_versioned(&mut buf, PRODUCE_API_VERSION).unwrap();
        assert!(!buf.is_empty());
    }

    #[test]
    fn response_surfaces_a_per_partition_error_code() {
        let mut buf = Vec::new();
        1_i32.write(&mut buf).unwrap(); // topic_count
        "orders".to_string().write(&mut buf).unwrap();
        1_i32.write(&mut buf).unwrap(); // partition_count
        0_i32.write(&mut buf).unwrap(); // index
        6_i16.write(&mut buf).unwrap(); // NotLeaderOrFollower
        (-1_i64).write(&mut buf).unwrap(); // base_offset
        0_i32.write(&mut buf).unwrap(); // throttle_time_ms

        let mut cursor = Cursor::new(buf);
        let response = ProduceResponse::read_versioned(&mut cursor, PRODUCE_API_VERSION).unwrap();

        let topic = response.responses.exactly_one().unwrap();
        let partition = topic.partition_responses.exactly_one().unwrap();
        assert!(partition.error_code.is_some());
        assert!(partition.error_code.unwrap().is_retriable());
    }

    #[test]
    fn response_with_no_error_has_no_error_code() {
        let mut buf = Vec::new();
        1_i32.write(&mut buf).unwrap();
        "orders".to_string().write(&mut buf).unwrap();
        1_i32.write(&mut buf).unwrap();
        0_i32.write(&mut buf).unwrap();
        0_i16.write(&mut buf).unwrap(); // no error
        42_i64.write(&mut buf).unwrap();
        0_i32.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let response = ProduceResponse::read_versioned(&mut cursor, PRODUCE_API_VERSION).unwrap();
        let topic = response.responses.exactly_one().unwrap();
        let partition = topic.partition_responses.exactly_one().unwrap();
        assert!(partition.error_code.is_none());
        assert_eq!(partition.base_offset, 42);
    }
}
