//! Encodings for the scalar and length-prefixed wire types that make up
//! every request and response body.
//!
//! # References
//! - <https://kafka.apache.org/protocol#protocol_types>
//! - <https://cwiki.apache.org/confluence/display/KAFKA/KIP-482%3A+The+Kafka+Protocol+should+Support+Optional+Tagged+Fields#KIP482:TheKafkaProtocolshouldSupportOptionalTaggedFields-UnsignedVarints>

use std::io::{Cursor, Read, Write};

use integer_encoding::{VarIntReader, VarIntWriter};

#[cfg(test)]
use proptest::prelude::*;

use crate::protocol::traits::{ReadCompactType, WriteCompactType};

use super::{
    record::RecordBatch,
    traits::{ReadError, ReadType, WriteError, WriteType},
    vec_builder::VecBuilder,
};

/// Reads exactly `len` bytes into a freshly allocated buffer.
///
/// Goes through [`VecBuilder`] rather than a plain `Vec::with_capacity` so a
/// malicious or corrupt length prefix can't be used to pre-allocate an
/// unbounded amount of memory before a single byte has actually arrived.
fn read_bytes(reader: &mut impl Read, len: usize) -> Result<Vec<u8>, ReadError> {
    Ok(VecBuilder::new(len).read_exact(reader)?.into())
}

fn read_utf8(reader: &mut impl Read, len: usize) -> Result<String, ReadError> {
    String::from_utf8(read_bytes(reader, len)?).map_err(|e| ReadError::Malformed(Box::new(e)))
}

macro_rules! big_endian_int {
    ($ty:ty, $width:literal) => {
        impl<R: Read> ReadType<R> for $ty {
            fn read(reader: &mut R) -> Result<Self, ReadError> {
                let mut buf = [0u8; $width];
                reader.read_exact(&mut buf)?;
                Ok(<$ty>::from_be_bytes(buf))
            }
        }

        impl<W: Write> WriteType<W> for $ty {
            fn write(&self, writer: &mut W) -> Result<(), WriteError> {
                writer.write_all(&self.to_be_bytes())?;
                Ok(())
            }
        }
    };
}

big_endian_int!(i8, 1);
big_endian_int!(i16, 2);
big_endian_int!(i32, 4);
big_endian_int!(u32, 4);
big_endian_int!(i64, 8);

impl<R: Read> ReadType<R> for bool {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        // Any non-zero byte reads as true, matching the Kafka broker's own
        // lenient decoding of BOOLEAN.
        Ok(buf[0] != 0)
    }
}

impl<W: Write> WriteType<W> for bool {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_all(&[u8::from(*self)])?;
        Ok(())
    }
}

/// An integer in `-2^31..=2^31-1`, zig-zag varint encoded as in Protocol
/// Buffers.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Varint(pub i32);

impl<R: Read> ReadType<R> for Varint {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        // integer-encoding only exposes a 64bit varint reader; read that and
        // narrow with a checked downcast rather than relying on a 32bit
        // reader that mishandles values near i32::MIN/MAX (see
        // https://github.com/dermesser/integer-encoding-rs/issues/21).
        let wide: i64 = reader.read_varint()?;
        Ok(Self(i32::try_from(wide)?))
    }
}

impl<W: Write> WriteType<W> for Varint {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_varint(self.0)?;
        Ok(())
    }
}

/// An integer in `-2^63..=2^63-1`, zig-zag varint encoded as in Protocol
/// Buffers.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Varlong(pub i64);

impl<R: Read> ReadType<R> for Varlong {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self(reader.read_varint()?))
    }
}

impl<W: Write> WriteType<W> for Varlong {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_varint(self.0)?;
        Ok(())
    }
}

/// An unsigned variable-length integer: 7 payload bits per byte,
/// little-endian group order, continuation signaled by the top bit.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct UnsignedVarint(pub u64);

impl<R: Read> ReadType<R> for UnsignedVarint {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let mut byte = [0u8; 1];
            reader.read_exact(&mut byte)?;
            let group = u64::from(byte[0]);

            value |= (group & 0x7f) << shift;
            if group & 0x80 == 0 {
                return Ok(Self(value));
            }

            shift += 7;
            if shift > 63 {
                return Err(ReadError::Malformed(
                    String::from("Overflow while reading unsigned varint").into(),
                ));
            }
        }
    }
}

impl<W: Write> WriteType<W> for UnsignedVarint {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let mut remaining = self.0;
        loop {
            let mut group = u8::try_from(remaining & 0x7f).map_err(WriteError::Overflow)?;
            remaining >>= 7;
            if remaining > 0 {
                group |= 0x80;
            }
            writer.write_all(&[group])?;

            if remaining == 0 {
                return Ok(());
            }
        }
    }
}

/// A possibly-absent string: an `i16` length prefix (`-1` for null) followed
/// by that many UTF-8 bytes.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct NullableString(pub Option<String>);

impl<R: Read> ReadType<R> for NullableString {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Option::<String>::read(reader).map(Self)
    }
}

impl<W: Write> WriteType<W> for NullableString {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.0.write(writer)
    }
}

impl<R: Read> ReadType<R> for String {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = usize::try_from(i16::read(reader)?)?;
        read_utf8(reader, len)
    }
}

impl<W: Write> WriteType<W> for String {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        i16::try_from(self.len())
            .map_err(WriteError::Overflow)?
            .write(writer)?;
        writer.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl<R: Read> ReadType<R> for Option<String> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        match i16::read(reader)? {
            len if len < -1 => Err(ReadError::Malformed(
                format!("Invalid negative length for nullable string: {len}").into(),
            )),
            -1 => Ok(None),
            len => read_utf8(reader, usize::try_from(len)?).map(Some),
        }
    }
}

impl<W: Write> WriteType<W> for Option<String> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        match self {
            Some(s) => s.write(writer),
            None => (-1i16).write(writer),
        }
    }
}

impl<R: Read> ReadCompactType<R> for String {
    fn read_compact(reader: &mut R) -> Result<Self, ReadError> {
        match UnsignedVarint::read(reader)?.0 {
            0 => Err(ReadError::Malformed(
                "CompactString must have non-zero length".into(),
            )),
            len => read_utf8(reader, usize::try_from(len - 1)?),
        }
    }
}

impl<W: Write> WriteCompactType<W> for String {
    fn write_compact(&self, writer: &mut W) -> Result<(), WriteError> {
        let len = u64::try_from(self.len() + 1).map_err(WriteError::Overflow)?;
        UnsignedVarint(len).write(writer)?;
        writer.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl<R: Read> ReadCompactType<R> for Option<String> {
    fn read_compact(reader: &mut R) -> Result<Self, ReadError> {
        match UnsignedVarint::read(reader)?.0 {
            0 => Ok(None),
            len => read_utf8(reader, usize::try_from(len - 1)?).map(Some),
        }
    }
}

impl<W: Write> WriteCompactType<W> for Option<String> {
    fn write_compact(&self, writer: &mut W) -> Result<(), WriteError> {
        match self {
            Some(s) => s.write_compact(writer),
            None => UnsignedVarint(0).write(writer),
        }
    }
}

impl<R: Read> ReadType<R> for Option<Vec<u8>> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        match i32::read(reader)? {
            len if len < -1 => Err(ReadError::Malformed(
                format!("Invalid negative length for nullable bytes: {len}").into(),
            )),
            -1 => Ok(None),
            len => read_bytes(reader, usize::try_from(len)?).map(Some),
        }
    }
}

impl<W: Write> WriteType<W> for Option<Vec<u8>> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        match self {
            Some(buf) => {
                i32::try_from(buf.len())
                    .map_err(|e| WriteError::Malformed(Box::new(e)))?
                    .write(writer)?;
                writer.write_all(buf)?;
                Ok(())
            }
            None => (-1i32).write(writer),
        }
    }
}

impl<R: Read> ReadType<R> for Vec<u8> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        match i32::read(reader)? {
            len if len < 0 => Err(ReadError::Malformed(
                format!("Invalid length for bytes: {len}").into(),
            )),
            len => read_bytes(reader, usize::try_from(len)?),
        }
    }
}

impl<W: Write> WriteType<W> for Vec<u8> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let len = i32::try_from(self.len()).map_err(|e| WriteError::Malformed(Box::new(e)))?;
        len.write(writer)?;
        writer.write_all(self)?;
        Ok(())
    }
}

impl<R: Read> ReadCompactType<R> for Vec<u8> {
    fn read_compact(reader: &mut R) -> Result<Self, ReadError> {
        match UnsignedVarint::read(reader)?.0 {
            0 => Err(ReadError::Malformed(
                "CompactBytes must have non-zero length".into(),
            )),
            len => read_bytes(reader, usize::try_from(len - 1)?),
        }
    }
}

impl<W: Write> WriteCompactType<W> for Vec<u8> {
    fn write_compact(&self, writer: &mut W) -> Result<(), WriteError> {
        let len = u64::try_from(self.len() + 1).map_err(WriteError::Overflow)?;
        UnsignedVarint(len).write(writer)?;
        writer.write_all(self)?;
        Ok(())
    }
}

/// A non-nullable, compact-only byte string (no classic-encoding form
/// exists for this type in the wire formats that use it).
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct CompactBytes(pub Vec<u8>);

impl<R: Read> ReadType<R> for CompactBytes {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Vec::<u8>::read_compact(reader).map(Self)
    }
}

impl<W: Write> WriteType<W> for CompactBytes {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.0.write_compact(writer)
    }
}

/// A run of optional tagged fields: a count, then `(tag, opaque payload)`
/// pairs. Unknown tags round-trip as raw bytes since a reader may not know
/// every tag a newer writer emitted.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct TaggedFields(pub Vec<(UnsignedVarint, Vec<u8>)>);

impl<R: Read> ReadType<R> for TaggedFields {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let count = usize::try_from(UnsignedVarint::read(reader)?.0).map_err(ReadError::Overflow)?;
        let mut fields = VecBuilder::new(count);
        for _ in 0..count {
            let tag = UnsignedVarint::read(reader)?;
            let payload_len = usize::try_from(UnsignedVarint::read(reader)?.0).map_err(ReadError::Overflow)?;
            fields.push((tag, read_bytes(reader, payload_len)?));
        }
        Ok(Self(fields.into()))
    }
}

impl<W: Write> WriteType<W> for TaggedFields {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        UnsignedVarint(u64::try_from(self.0.len()).map_err(WriteError::Overflow)?).write(writer)?;

        for (tag, payload) in &self.0 {
            tag.write(writer)?;
            UnsignedVarint(u64::try_from(payload.len()).map_err(WriteError::Overflow)?).write(writer)?;
            writer.write_all(payload)?;
        }

        Ok(())
    }
}

impl<W: Write> WriteType<W> for Option<TaggedFields> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        match self {
            Some(fields) => fields.write(writer),
            None => TaggedFields::default().write(writer),
        }
    }
}

/// A classic (non-compact) array of `T`: an `i32` element count (`-1` reads
/// as empty) followed by that many elements.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Array<T>(pub Option<Vec<T>>);

impl<R: Read> ReadType<R> for Vec<String> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = i32::read(reader)?;
        if len == -1 {
            return Ok(vec![]);
        }
        let mut elements = VecBuilder::new(usize::try_from(len)?);
        for _ in 0..len {
            elements.push(String::read(reader)?);
        }
        Ok(elements.into())
    }
}

impl<W: Write> WriteType<W> for Vec<String> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        if self.is_empty() {
            return (-1i32).write(writer);
        }
        i32::try_from(self.len())?.write(writer)?;
        for element in self {
            element.write(writer)?;
        }
        Ok(())
    }
}

impl<R: Read> ReadType<R> for Vec<i32> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = i32::read(reader)?;
        if len == -1 {
            return Ok(vec![]);
        }
        let mut elements = VecBuilder::new(usize::try_from(len)?);
        for _ in 0..len {
            elements.push(i32::read(reader)?);
        }
        Ok(elements.into())
    }
}

impl<R: Read> ReadType<R> for Vec<i64> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = i32::read(reader)?;
        if len == -1 {
            return Ok(vec![]);
        }
        let mut elements = VecBuilder::new(usize::try_from(len)?);
        for _ in 0..len {
            elements.push(i64::read(reader)?);
        }
        Ok(elements.into())
    }
}

impl<W: Write> WriteType<W> for Vec<i32> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        if self.is_empty() {
            return (-1i32).write(writer);
        }
        i32::try_from(self.len())?.write(writer)?;
        for element in self {
            element.write(writer)?;
        }
        Ok(())
    }
}

impl<R: Read> ReadCompactType<R> for Vec<String> {
    fn read_compact(reader: &mut R) -> Result<Self, ReadError> {
        let len = UnsignedVarint::read(reader)?.0;
        if len == 0 {
            return Ok(vec![]);
        }
        let len = usize::try_from(len - 1).map_err(ReadError::Overflow)?;
        let mut elements = VecBuilder::new(len);
        for _ in 0..len {
            elements.push(String::read_compact(reader)?);
        }
        Ok(elements.into())
    }
}

impl<W: Write> WriteCompactType<W> for Vec<String> {
    fn write_compact(&self, writer: &mut W) -> Result<(), WriteError> {
        if self.is_empty() {
            return UnsignedVarint(0).write(writer);
        }
        UnsignedVarint(u64::try_from(self.len() + 1).map_err(WriteError::from)?).write(writer)?;
        for element in self {
            element.write_compact(writer)?;
        }
        Ok(())
    }
}

impl<R: Read> ReadCompactType<R> for Vec<i32> {
    fn read_compact(reader: &mut R) -> Result<Self, ReadError> {
        let len = UnsignedVarint::read(reader)?.0;
        if len == 0 {
            return Ok(vec![]);
        }
        let len = usize::try_from(len - 1).map_err(ReadError::Overflow)?;
        let mut elements = VecBuilder::new(len);
        for _ in 0..len {
            elements.push(i32::read(reader)?);
        }
        Ok(elements.into())
    }
}

impl<W: Write> WriteCompactType<W> for Vec<i32> {
    fn write_compact(&self, writer: &mut W) -> Result<(), WriteError> {
        if self.is_empty() {
            return UnsignedVarint(0).write(writer);
        }
        UnsignedVarint(u64::try_from(self.len() + 1).map_err(WriteError::from)?).write(writer)?;
        for element in self {
            element.write(writer)?;
        }
        Ok(())
    }
}

/// A batch of Kafka records, wire-encoded as `NULLABLE_BYTES`.
///
/// `Produce` requests always carry exactly one batch; `Fetch` responses may
/// carry zero, one, or more, and a trailing batch may be cut in half when
/// the broker hit a size limit mid-write (observed in practice against real
/// brokers, not spelled out anywhere in the protocol docs).
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Records(
    #[cfg_attr(test, proptest(strategy = "prop::collection::vec(any::<RecordBatch>(), 0..2)"))]
    pub Vec<RecordBatch>,
);

impl<R: Read> ReadType<R> for Records {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let raw = Option::<Vec<u8>>::read(reader)?.unwrap_or_default();
        let end = u64::try_from(raw.len())?;
        let mut cursor = Cursor::new(raw);

        let mut batches = vec![];
        while cursor.position() < end {
            match RecordBatch::read(&mut cursor) {
                Ok(batch) => batches.push(batch),
                // A batch sliced off mid-write by FetchRequest::max_bytes
                // looks like an EOF partway through, not a protocol error.
                Err(ReadError::IO(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }

        Ok(Self(batches))
    }
}

impl<W: Write> WriteType<W> for Records {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let mut encoded = vec![];
        for batch in &self.0 {
            batch.write(&mut encoded)?;
        }
        Some(encoded).write(writer)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;

    use crate::protocol::{
        record::{ControlBatchOrRecords, RecordBatchCompression, RecordBatchTimestampType},
        test_utils::test_roundtrip,
    };

    use super::*;

    test_roundtrip!(bool, test_bool_roundtrip);

    #[test]
    fn test_boolean_decode() {
        assert!(!bool::read(&mut Cursor::new(vec![0])).unwrap());

        for v in [1, 35, 255] {
            assert!(bool::read(&mut Cursor::new(vec![v])).unwrap());
        }
    }

    test_roundtrip!(i16, test_i16_roundtrip);
    test_roundtrip!(i8, test_int8_roundtrip);
    test_roundtrip!(i16, test_int16_roundtrip);
    test_roundtrip!(i32, test_int32_roundtrip);
    test_roundtrip!(i64, test_int64_roundtrip);
    test_roundtrip!(u32, test_uint32_roundtrip);

    test_roundtrip!(Varint, test_varint_roundtrip);

    #[test]
    fn test_varint_special_values() {
        // https://developers.google.com/protocol-buffers/docs/encoding?csw=1#varints
        for v in [0, -1, 1, -2, 2147483647, -2147483648] {
            let mut data = vec![];
            Varint(v).write(&mut data).unwrap();

            let restored = Varint::read(&mut Cursor::new(data)).unwrap();
            assert_eq!(restored.0, v);
        }
    }

    #[test]
    fn test_varint_read_read_overflow() {
        let mut buf = Cursor::new(vec![0xffu8; 11]);

        let err = Varint::read(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::IO(_));
        assert_eq!(err.to_string(), "Cannot read data: Unterminated varint",);
    }

    #[test]
    fn test_varint_read_downcast_overflow() {
        let mut data = vec![0xffu8; 9];
        data.push(0x00);
        let mut buf = Cursor::new(data);

        let err = Varint::read(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::Overflow(_));
        assert_eq!(
            err.to_string(),
            "Overflow converting integer: out of range integral type conversion attempted",
        );
    }

    test_roundtrip!(Varlong, test_varlong_roundtrip);

    #[test]
    fn test_varlong_special_values() {
        for v in [0, -1, 1, -2, 2147483647, -2147483648, i64::MIN, i64::MAX] {
            let mut data = vec![];
            Varlong(v).write(&mut data).unwrap();

            let restored = Varlong::read(&mut Cursor::new(data)).unwrap();
            assert_eq!(restored.0, v);
        }
    }

    #[test]
    fn test_varlong_read_overflow() {
        let mut buf = Cursor::new(vec![0xffu8; 11]);

        let err = Varlong::read(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::IO(_));
        assert_eq!(err.to_string(), "Cannot read data: Unterminated varint",);
    }

    test_roundtrip!(UnsignedVarint, test_unsigned_varint_roundtrip);

    #[test]
    fn test_unsigned_varint_read_overflow() {
        let mut buf = Cursor::new(vec![0xffu8; 64 / 7 + 1]);

        let err = UnsignedVarint::read(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::Malformed(_));
        assert_eq!(
            err.to_string(),
            "Malformed data: Overflow while reading unsigned varint",
        );
    }

    test_roundtrip!(String, test_string_roundtrip);

    #[test]
    fn test_string_blowup_memory() {
        let mut buf = Cursor::new(Vec::<u8>::new());
        i16::MAX.write(&mut buf).unwrap();
        buf.set_position(0);

        let err = String::read(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::IO(_));
    }

    test_roundtrip!(NullableString, test_nullable_string_roundtrip);

    #[test]
    fn test_nullable_string_read_negative_length() {
        let mut buf = Cursor::new(Vec::<u8>::new());
        (-2i16).write(&mut buf).unwrap();
        buf.set_position(0);

        let err = NullableString::read(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::Malformed(_));
        assert_eq!(
            err.to_string(),
            "Malformed data: Invalid negative length for nullable string: -2",
        );
    }

    #[test]
    fn test_nullable_string_blowup_memory() {
        let mut buf = Cursor::new(Vec::<u8>::new());
        i16::MAX.write(&mut buf).unwrap();
        buf.set_position(0);

        let err = NullableString::read(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::IO(_));
    }

    #[test]
    fn test_compact_string_blowup_memory() {
        let mut buf = Cursor::new(Vec::<u8>::new());
        UnsignedVarint(u64::MAX).write(&mut buf).unwrap();
        buf.set_position(0);

        let err = String::read_compact(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::IO(_));
    }

    #[test]
    fn test_compact_nullable_string_blowup_memory() {
        let mut buf = Cursor::new(Vec::<u8>::new());
        UnsignedVarint(u64::MAX).write(&mut buf).unwrap();
        buf.set_position(0);

        let result: Result<Option<String>, ReadError> = ReadCompactType::read_compact(&mut buf);
        assert_matches!(result.unwrap_err(), ReadError::IO(_));
    }

    test_roundtrip!(TaggedFields, test_tagged_fields_roundtrip);

    #[test]
    fn test_tagged_fields_blowup_memory() {
        let mut buf = Cursor::new(Vec::<u8>::new());

        UnsignedVarint(u64::MAX).write(&mut buf).unwrap(); // field count
        UnsignedVarint(u64::MAX).write(&mut buf).unwrap(); // tag
        UnsignedVarint(u64::MAX).write(&mut buf).unwrap(); // payload length

        buf.set_position(0);

        let err = TaggedFields::read(&mut buf).unwrap_err();
        assert_matches!(err, ReadError::IO(_));
    }

    test_roundtrip!(Vec<i32>, test_array_roundtrip);
    test_roundtrip!(Vec<i32>, test_compact_array_roundtrip);
    test_roundtrip!(Records, test_records_roundtrip);

    #[test]
    fn test_records_partial() {
        let batch_1 = record_batch(1);
        let batch_2 = record_batch(2);

        let mut buf = vec![];
        batch_1.write(&mut buf).unwrap();
        batch_2.write(&mut buf).unwrap();
        let truncated = buf[..buf.len() - 1].to_vec();

        let mut framed = vec![];
        Some(truncated).write(&mut framed).unwrap();

        let records = Records::read(&mut Cursor::new(framed)).unwrap();
        assert_eq!(records.0, vec![batch_1]);
    }

    fn record_batch(base_offset: i64) -> RecordBatch {
        RecordBatch {
            base_offset,
            partition_leader_epoch: 0,
            last_offset_delta: 0,
            first_timestamp: 0,
            max_timestamp: 0,
            producer_id: 0,
            producer_epoch: 0,
            base_sequence: 0,
            records: ControlBatchOrRecords::Records(vec![]),
            compression: RecordBatchCompression::NoCompression,
            is_transactional: false,
            timestamp_type: RecordBatchTimestampType::CreateTime,
        }
    }

    /// Large enough that decoding it by accident (instead of bailing out on
    /// a bogus length) would show up as an OOM in CI.
    #[derive(Debug)]
    struct Large {
        _inner: [u8; 1024],
    }

    impl<R: Read> ReadType<R> for Large {
        fn read(reader: &mut R) -> Result<Self, ReadError> {
            i32::read(reader)?;
            unreachable!()
        }
    }
}
