//! The two directions every wire type implements: decode from a byte stream
//! ([`ReadType`]) and encode onto one ([`WriteType`]), plus the compact
//! (varint-length) variants used by flexible-version messages.

use std::io::{Read, Write};

use thiserror::Error;

macro_rules! codec_error {
    ($name:ident, $io_msg:literal) => {
        #[derive(Error, Debug)]
        #[non_exhaustive]
        pub enum $name {
            #[error($io_msg)]
            IO(#[from] std::io::Error),

            #[error("Overflow converting integer: {0}")]
            Overflow(#[from] std::num::TryFromIntError),

            #[error("Malformed data: {0}")]
            Malformed(#[from] Box<dyn std::error::Error + Send + Sync>),
        }
    };
}

codec_error!(ReadError, "Cannot read data: {0}");
codec_error!(WriteError, "Cannot write data: {0}");

/// Decodes a value of `Self` from the front of `reader`, consuming exactly
/// as many bytes as the wire format needs -- no more, no less.
pub trait ReadType<R>: Sized
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError>;
}

/// Encodes `self` onto `writer` in this type's wire format.
pub trait WriteType<W>: Sized
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError>;
}

/// The tagged-field ("flexible"/"compact") encoding of a type that also has
/// a classic [`WriteType`] encoding for pre-flexible message versions.
pub trait WriteCompactType<W>: WriteType<W>
where
    W: Write,
{
    fn write_compact(&self, writer: &mut W) -> Result<(), WriteError>;
}

/// The tagged-field counterpart to [`WriteCompactType`].
pub trait ReadCompactType<R>: ReadType<R>
where
    R: Read,
{
    fn read_compact(reader: &mut R) -> Result<Self, ReadError>;
}
