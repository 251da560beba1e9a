//! Record batch v2 codec.
//!
//! # References
//! - <https://kafka.apache.org/documentation/#recordbatch>
//! - <https://cwiki.apache.org/confluence/display/KAFKA/KIP-98+-+Exactly+Once+Delivery+and+Transactional+Messaging>

use std::io::{Cursor, Read, Write};

use crc32c::crc32c;
#[cfg(test)]
use proptest::prelude::*;

use super::{
    primitives::{Varint, Varlong},
    traits::{ReadError, ReadType, WriteError, WriteType},
    vec_builder::VecBuilder,
};

const MAGIC: i8 = 2;

/// One key/value header attached to a [`Record`].
///
/// Headers are stored as a plain vector rather than a map: the wire format
/// allows duplicate keys and the order they were produced in is observable
/// to consumers, so a `BTreeMap` would silently reorder and deduplicate them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

impl<R: Read> ReadType<R> for RecordHeader {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let key_len = Varint::read(reader)?.0;
        let key = read_varint_framed_string(reader, key_len)?;

        let value_len = Varint::read(reader)?.0;
        let value = read_varint_framed_bytes(reader, value_len)?;

        Ok(Self { key, value })
    }
}

impl<W: Write> WriteType<W> for RecordHeader {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let key_len = Varint(i32::try_from(self.key.len()).map_err(WriteError::Overflow)?);
        key_len.write(writer)?;
        writer.write_all(self.key.as_bytes())?;

        write_varint_framed_bytes(writer, &self.value)?;

        Ok(())
    }
}

fn read_varint_framed_bytes<R: Read>(
    reader: &mut R,
    len: i32,
) -> Result<Option<Vec<u8>>, ReadError> {
    match len {
        l if l < -1 => Err(ReadError::Malformed(
            format!("Invalid negative length: {}", l).into(),
        )),
        -1 => Ok(None),
        l => {
            let builder = VecBuilder::new(usize::try_from(l)?).read_exact(reader)?;
            Ok(Some(builder.into()))
        }
    }
}

fn read_varint_framed_string<R: Read>(reader: &mut R, len: i32) -> Result<String, ReadError> {
    let len = usize::try_from(len).map_err(ReadError::Overflow)?;
    let builder = VecBuilder::new(len).read_exact(reader)?;
    String::from_utf8(builder.into()).map_err(|e| ReadError::Malformed(Box::new(e)))
}

fn write_varint_framed_bytes<W: Write>(
    writer: &mut W,
    data: &Option<Vec<u8>>,
) -> Result<(), WriteError> {
    match data {
        Some(buf) => {
            Varint(i32::try_from(buf.len()).map_err(WriteError::Overflow)?).write(writer)?;
            writer.write_all(buf)?;
        }
        None => {
            Varint(-1).write(writer)?;
        }
    }
    Ok(())
}

/// A single record within a [`RecordBatch`], with its offset and timestamp
/// already resolved relative to the batch's base values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Record {
    pub offset: i64,
    pub timestamp: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    #[cfg_attr(
        test,
        proptest(strategy = "prop::collection::vec(any::<RecordHeader>(), 0..3)")
    )]
    pub headers: Vec<RecordHeader>,
}

/// A record as it is encoded on the wire, before the batch's base offset and
/// base timestamp are added back in.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EncodedRecord {
    timestamp_delta: i64,
    offset_delta: i32,
    key: Option<Vec<u8>>,
    value: Option<Vec<u8>>,
    headers: Vec<RecordHeader>,
}

impl<R: Read> ReadType<R> for EncodedRecord {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let _len = Varint::read(reader)?;
        let _attributes = i8::read(reader)?;
        let timestamp_delta = Varlong::read(reader)?.0;
        let offset_delta = Varint::read(reader)?.0;

        let key_len = Varint::read(reader)?.0;
        let key = read_varint_framed_bytes(reader, key_len)?;

        let value_len = Varint::read(reader)?.0;
        let value = read_varint_framed_bytes(reader, value_len)?;

        let headers_count = Varint::read(reader)?.0;
        if headers_count < 0 {
            return Err(ReadError::Malformed(
                format!("Invalid negative header count: {}", headers_count).into(),
            ));
        }
        let mut headers = VecBuilder::new(usize::try_from(headers_count)?);
        for _ in 0..headers_count {
            headers.push(RecordHeader::read(reader)?);
        }

        Ok(Self {
            timestamp_delta,
            offset_delta,
            key,
            value,
            headers: headers.into(),
        })
    }
}

impl<W: Write> WriteType<W> for EncodedRecord {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        // Body is written to a scratch buffer first since the length prefix
        // covers everything that follows it.
        let mut body = Vec::new();
        0i8.write(&mut body)?;
        Varlong(self.timestamp_delta).write(&mut body)?;
        Varint(self.offset_delta).write(&mut body)?;
        write_varint_framed_bytes(&mut body, &self.key)?;
        write_varint_framed_bytes(&mut body, &self.value)?;

        let headers_count =
            i32::try_from(self.headers.len()).map_err(WriteError::Overflow)?;
        Varint(headers_count).write(&mut body)?;
        for header in &self.headers {
            header.write(&mut body)?;
        }

        let len = i32::try_from(body.len()).map_err(WriteError::Overflow)?;
        Varint(len).write(writer)?;
        writer.write_all(&body)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum RecordBatchCompression {
    NoCompression,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl RecordBatchCompression {
    fn from_attributes(attributes: i16) -> Result<Self, ReadError> {
        match attributes & 0x07 {
            0 => Ok(Self::NoCompression),
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Snappy),
            3 => Ok(Self::Lz4),
            4 => Ok(Self::Zstd),
            other => Err(ReadError::Malformed(
                format!("unsupported compression codec: {}", other).into(),
            )),
        }
    }

    fn bits(&self) -> i16 {
        match self {
            Self::NoCompression => 0,
            Self::Gzip => 1,
            Self::Snappy => 2,
            Self::Lz4 => 3,
            Self::Zstd => 4,
        }
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, WriteError> {
        match self {
            Self::NoCompression => Ok(data.to_vec()),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => {
                use flate2::{write::GzEncoder, Compression};
                let mut enc = GzEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                enc.finish()
                    .map_err(|e| WriteError::Malformed(Box::new(e)))
            }
            #[cfg(not(feature = "compression-gzip"))]
            Self::Gzip => Err(WriteError::Malformed("gzip support not compiled in".into())),
            #[cfg(feature = "compression-snappy")]
            Self::Snappy => snappy_compress_xerial(data),
            #[cfg(not(feature = "compression-snappy"))]
            Self::Snappy => Err(WriteError::Malformed(
                "snappy support not compiled in".into(),
            )),
            #[cfg(feature = "compression-lz4")]
            Self::Lz4 => {
                let mut enc = lz4::EncoderBuilder::new()
                    .build(Vec::new())
                    .map_err(|e| WriteError::Malformed(Box::new(e)))?;
                enc.write_all(data)?;
                let (buf, result) = enc.finish();
                result.map_err(|e| WriteError::Malformed(Box::new(e)))?;
                Ok(buf)
            }
            #[cfg(not(feature = "compression-lz4"))]
            Self::Lz4 => Err(WriteError::Malformed("lz4 support not compiled in".into())),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => {
                zstd::encode_all(data, 0).map_err(|e| WriteError::Malformed(Box::new(e)))
            }
            #[cfg(not(feature = "compression-zstd"))]
            Self::Zstd => Err(WriteError::Malformed("zstd support not compiled in".into())),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, ReadError> {
        match self {
            Self::NoCompression => Ok(data.to_vec()),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => {
                use flate2::read::GzDecoder;
                let mut out = Vec::new();
                GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(ReadError::IO)?;
                Ok(out)
            }
            #[cfg(not(feature = "compression-gzip"))]
            Self::Gzip => Err(ReadError::Malformed("gzip support not compiled in".into())),
            #[cfg(feature = "compression-snappy")]
            Self::Snappy => snappy_decompress_xerial(data),
            #[cfg(not(feature = "compression-snappy"))]
            Self::Snappy => Err(ReadError::Malformed(
                "snappy support not compiled in".into(),
            )),
            #[cfg(feature = "compression-lz4")]
            Self::Lz4 => {
                let mut out = Vec::new();
                lz4::Decoder::new(data)
                    .map_err(ReadError::IO)?
                    .read_to_end(&mut out)
                    .map_err(ReadError::IO)?;
                Ok(out)
            }
            #[cfg(not(feature = "compression-lz4"))]
            Self::Lz4 => Err(ReadError::Malformed("lz4 support not compiled in".into())),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => {
                zstd::decode_all(data).map_err(|e| ReadError::Malformed(Box::new(e)))
            }
            #[cfg(not(feature = "compression-zstd"))]
            Self::Zstd => Err(ReadError::Malformed("zstd support not compiled in".into())),
        }
    }
}

/// Kafka's broker-side (and the reference Java client's) snappy frames use
/// the xerial block format rather than raw snappy: an 8 byte magic, two
/// 4 byte version fields, then a sequence of (length-prefixed) compressed
/// chunks of up to 32KiB of uncompressed input each.
#[cfg(feature = "compression-snappy")]
const XERIAL_MAGIC: [u8; 8] = [0x82, b'S', b'N', b'A', b'P', b'P', b'Y', 0x00];
#[cfg(feature = "compression-snappy")]
const XERIAL_CHUNK_SIZE: usize = 32 * 1024;

#[cfg(feature = "compression-snappy")]
fn snappy_compress_xerial(data: &[u8]) -> Result<Vec<u8>, WriteError> {
    let mut out = Vec::new();
    out.extend_from_slice(&XERIAL_MAGIC);
    out.extend_from_slice(&1i32.to_be_bytes());
    out.extend_from_slice(&1i32.to_be_bytes());

    let mut encoder = snap::raw::Encoder::new();
    for chunk in data.chunks(XERIAL_CHUNK_SIZE) {
        let compressed = encoder
            .compress_vec(chunk)
            .map_err(|e| WriteError::Malformed(Box::new(e)))?;
        out.extend_from_slice(&(compressed.len() as i32).to_be_bytes());
        out.extend_from_slice(&compressed);
    }
    Ok(out)
}

#[cfg(feature = "compression-snappy")]
fn snappy_decompress_xerial(data: &[u8]) -> Result<Vec<u8>, ReadError> {
    if data.len() < XERIAL_MAGIC.len() + 8 || data[..XERIAL_MAGIC.len()] != XERIAL_MAGIC {
        // Not xerial-framed; assume a bare snappy block (some producers emit this).
        return snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| ReadError::Malformed(Box::new(e)));
    }

    let mut pos = XERIAL_MAGIC.len() + 8;
    let mut out = Vec::new();
    let mut decoder = snap::raw::Decoder::new();
    while pos < data.len() {
        if pos + 4 > data.len() {
            return Err(ReadError::Malformed("truncated xerial chunk header".into()));
        }
        let chunk_len = i32::from_be_bytes(data[pos..pos + 4].try_into().unwrap());
        let chunk_len = usize::try_from(chunk_len).map_err(ReadError::Overflow)?;
        pos += 4;
        if pos + chunk_len > data.len() {
            return Err(ReadError::Malformed("truncated xerial chunk body".into()));
        }
        let chunk = decoder
            .decompress_vec(&data[pos..pos + chunk_len])
            .map_err(|e| ReadError::Malformed(Box::new(e)))?;
        out.extend_from_slice(&chunk);
        pos += chunk_len;
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum RecordBatchTimestampType {
    CreateTime,
    LogAppendTime,
}

/// Either a normal set of user records or an opaque control batch body.
///
/// Control batches (transaction markers) are never surfaced to consumers; we
/// keep their raw bytes around only so a batch that happens to contain one
/// round-trips exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ControlBatchOrRecords {
    Records(
        #[cfg_attr(
            test,
            proptest(strategy = "prop::collection::vec(any::<Record>(), 0..3)")
        )]
        Vec<Record>,
    ),
    ControlBatch(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct RecordBatch {
    pub base_offset: i64,
    pub partition_leader_epoch: i32,
    pub last_offset_delta: i32,
    pub first_timestamp: i64,
    pub max_timestamp: i64,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub base_sequence: i32,
    pub records: ControlBatchOrRecords,
    pub compression: RecordBatchCompression,
    pub is_transactional: bool,
    pub timestamp_type: RecordBatchTimestampType,
}

impl<R: Read> ReadType<R> for RecordBatch {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let base_offset = i64::read(reader)?;
        let batch_length = i32::read(reader)?;
        let batch_length = usize::try_from(batch_length)?;

        let mut body = VecBuilder::new(batch_length).read_exact(reader)?;
        let body: Vec<u8> = body.into();
        let mut body = Cursor::new(body);

        let partition_leader_epoch = i32::read(&mut body)?;
        let magic = i8::read(&mut body)?;
        if magic != MAGIC {
            return Err(ReadError::Malformed(
                format!("unsupported record batch magic: {}", magic).into(),
            ));
        }

        let crc_start = body.position();
        let crc = u32::read(&mut body)?;

        let attributes = i16::read(&mut body)?;
        let compression = RecordBatchCompression::from_attributes(attributes)?;
        let timestamp_type = if attributes & 0x08 != 0 {
            RecordBatchTimestampType::LogAppendTime
        } else {
            RecordBatchTimestampType::CreateTime
        };
        let is_transactional = attributes & 0x10 != 0;
        let is_control = attributes & 0x20 != 0;

        let last_offset_delta = i32::read(&mut body)?;
        let first_timestamp = i64::read(&mut body)?;
        let max_timestamp = i64::read(&mut body)?;
        let producer_id = i64::read(&mut body)?;
        let producer_epoch = i16::read(&mut body)?;
        let base_sequence = i32::read(&mut body)?;
        let records_count = i32::read(&mut body)?;

        let payload_start = usize::try_from(body.position())?;
        let raw = body.into_inner();

        let crc_bytes = &raw[usize::try_from(crc_start)? + 4..];
        let actual_crc = crc32c(crc_bytes);
        if actual_crc != crc {
            return Err(ReadError::Malformed(
                format!(
                    "record batch CRC mismatch: expected {}, got {}",
                    crc, actual_crc
                )
                .into(),
            ));
        }

        let payload = compression.decompress(&raw[payload_start..])?;

        let records = if is_control {
            ControlBatchOrRecords::ControlBatch(payload)
        } else {
            let mut reader = Cursor::new(payload);
            let mut records = VecBuilder::new(records_count.max(0) as usize);
            for _ in 0..records_count {
                let encoded = EncodedRecord::read(&mut reader)?;
                records.push(Record {
                    offset: base_offset + i64::from(encoded.offset_delta),
                    timestamp: first_timestamp + encoded.timestamp_delta,
                    key: encoded.key,
                    value: encoded.value,
                    headers: encoded.headers,
                });
            }
            ControlBatchOrRecords::Records(records.into())
        };

        Ok(Self {
            base_offset,
            partition_leader_epoch,
            last_offset_delta,
            first_timestamp,
            max_timestamp,
            producer_id,
            producer_epoch,
            base_sequence,
            records,
            compression,
            is_transactional,
            timestamp_type,
        })
    }
}

impl<W: Write> WriteType<W> for RecordBatch {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let (records_count, payload) = match &self.records {
            ControlBatchOrRecords::Records(records) => {
                let mut payload = Vec::new();
                for record in records {
                    let encoded = EncodedRecord {
                        timestamp_delta: record.timestamp - self.first_timestamp,
                        offset_delta: i32::try_from(record.offset - self.base_offset)
                            .map_err(WriteError::Overflow)?,
                        key: record.key.clone(),
                        value: record.value.clone(),
                        headers: record.headers.clone(),
                    };
                    encoded.write(&mut payload)?;
                }
                (
                    i32::try_from(records.len()).map_err(WriteError::Overflow)?,
                    payload,
                )
            }
            ControlBatchOrRecords::ControlBatch(bytes) => (1, bytes.clone()),
        };

        let compressed = self.compression.compress(&payload)?;

        let mut attributes: i16 = self.compression.bits();
        if matches!(self.timestamp_type, RecordBatchTimestampType::LogAppendTime) {
            attributes |= 0x08;
        }
        if self.is_transactional {
            attributes |= 0x10;
        }
        if matches!(self.records, ControlBatchOrRecords::ControlBatch(_)) {
            attributes |= 0x20;
        }

        // Everything after `partition_leader_epoch`/`magic` is assembled first so
        // the CRC (which covers `attributes..end`) can be computed before writing.
        let mut crc_body = Vec::new();
        attributes.write(&mut crc_body)?;
        self.last_offset_delta.write(&mut crc_body)?;
        self.first_timestamp.write(&mut crc_body)?;
        self.max_timestamp.write(&mut crc_body)?;
        self.producer_id.write(&mut crc_body)?;
        self.producer_epoch.write(&mut crc_body)?;
        self.base_sequence.write(&mut crc_body)?;
        records_count.write(&mut crc_body)?;
        crc_body.write_all(&compressed)?;

        let crc = crc32c(&crc_body);

        let mut batch = Vec::new();
        self.partition_leader_epoch.write(&mut batch)?;
        MAGIC.write(&mut batch)?;
        crc.write(&mut batch)?;
        batch.write_all(&crc_body)?;

        self.base_offset.write(writer)?;
        let batch_length = i32::try_from(batch.len()).map_err(WriteError::Overflow)?;
        batch_length.write(writer)?;
        writer.write_all(&batch)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_roundtrips() {
        let batch = RecordBatch {
            base_offset: 42,
            partition_leader_epoch: 0,
            last_offset_delta: 0,
            first_timestamp: 1000,
            max_timestamp: 1000,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records: ControlBatchOrRecords::Records(vec![]),
            compression: RecordBatchCompression::NoCompression,
            is_transactional: false,
            timestamp_type: RecordBatchTimestampType::CreateTime,
        };

        let mut buf = Vec::new();
        batch.write(&mut buf).unwrap();

        let restored = RecordBatch::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(restored, batch);
        assert_eq!(restored.base_offset, 42);
    }

    #[test]
    fn records_preserve_header_order() {
        let batch = RecordBatch {
            base_offset: 0,
            partition_leader_epoch: 0,
            last_offset_delta: 0,
            first_timestamp: 0,
            max_timestamp: 0,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records: ControlBatchOrRecords::Records(vec![Record {
                offset: 0,
                timestamp: 0,
                key: Some(b"k".to_vec()),
                value: Some(b"v".to_vec()),
                headers: vec![
                    RecordHeader {
                        key: "b".into(),
                        value: Some(b"2".to_vec()),
                    },
                    RecordHeader {
                        key: "a".into(),
                        value: Some(b"1".to_vec()),
                    },
                ],
            }]),
            compression: RecordBatchCompression::NoCompression,
            is_transactional: false,
            timestamp_type: RecordBatchTimestampType::CreateTime,
        };

        let mut buf = Vec::new();
        batch.write(&mut buf).unwrap();
        let restored = RecordBatch::read(&mut Cursor::new(buf)).unwrap();

        let ControlBatchOrRecords::Records(records) = restored.records else {
            panic!("expected records");
        };
        let headers = &records[0].headers;
        assert_eq!(headers[0].key, "b");
        assert_eq!(headers[1].key, "a");
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let batch = RecordBatch {
            base_offset: 0,
            partition_leader_epoch: 0,
            last_offset_delta: 0,
            first_timestamp: 0,
            max_timestamp: 0,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records: ControlBatchOrRecords::Records(vec![]),
            compression: RecordBatchCompression::NoCompression,
            is_transactional: false,
            timestamp_type: RecordBatchTimestampType::CreateTime,
        };

        let mut buf = Vec::new();
        batch.write(&mut buf).unwrap();
        // Flip a byte inside the CRC-covered region (attributes, right after the CRC field).
        let crc_field_end = 8 /* base_offset */ + 4 /* batch_length */ + 4 /* epoch */ + 1 /* magic */ + 4 /* crc */;
        buf[crc_field_end] ^= 0xff;

        let err = RecordBatch::read(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ReadError::Malformed(_)));
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_roundtrips() {
        let batch = RecordBatch {
            base_offset: 0,
            partition_leader_epoch: 0,
            last_offset_delta: 0,
            first_timestamp: 0,
            max_timestamp: 0,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records: ControlBatchOrRecords::Records(vec![Record {
                offset: 0,
                timestamp: 0,
                key: None,
                value: Some(b"hello world".to_vec()),
                headers: vec![],
            }]),
            compression: RecordBatchCompression::Gzip,
            is_transactional: false,
            timestamp_type: RecordBatchTimestampType::CreateTime,
        };

        let mut buf = Vec::new();
        batch.write(&mut buf).unwrap();
        let restored = RecordBatch::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(restored, batch);
    }

    #[cfg(feature = "compression-snappy")]
    #[test]
    fn snappy_roundtrips() {
        let batch = RecordBatch {
            base_offset: 0,
            partition_leader_epoch: 0,
            last_offset_delta: 0,
            first_timestamp: 0,
            max_timestamp: 0,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records: ControlBatchOrRecords::Records(vec![Record {
                offset: 0,
                timestamp: 0,
                key: None,
                value: Some(vec![b'x'; 100_000]),
                headers: vec![],
            }]),
            compression: RecordBatchCompression::Snappy,
            is_transactional: false,
            timestamp_type: RecordBatchTimestampType::CreateTime,
        };

        let mut buf = Vec::new();
        batch.write(&mut buf).unwrap();
        let restored = RecordBatch::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(restored, batch);
    }

    #[test]
    fn unknown_compression_code_errs() {
        let err = RecordBatchCompression::from_attributes(0x07).unwrap_err();
        assert!(matches!(err, ReadError::Malformed(_)));
    }
}
