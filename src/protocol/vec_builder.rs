//! A `Vec` builder that grows incrementally instead of trusting a
//! wire-supplied length up front.
//!
//! Every length-prefixed primitive (strings, byte arrays, arrays) reads an
//! attacker- or bug-controlled count before it has any of the payload. A naive
//! `Vec::with_capacity(len)` would let a four-byte length prefix claim a
//! multi-gigabyte allocation before a single byte of it is validated.
//! `VecBuilder` reserves in bounded chunks and only grows as bytes actually
//! arrive, so a short read fails with [`ReadError::IO`] instead of an OOM.

use std::io::Read;

use super::traits::ReadError;

/// Elements are read to fill pre-allocated space this large at a time.
const CHUNK: usize = 4096;

pub struct VecBuilder<T> {
    target_len: usize,
    data: Vec<T>,
}

impl<T> VecBuilder<T> {
    pub fn new(target_len: usize) -> Self {
        Self {
            target_len,
            data: Vec::with_capacity(target_len.min(CHUNK)),
        }
    }

    pub fn push(&mut self, v: T) {
        if self.data.len() == self.data.capacity() {
            let remaining = self.target_len - self.data.len();
            self.data.reserve(remaining.min(CHUNK));
        }
        self.data.push(v);
    }
}

impl VecBuilder<u8> {
    /// Fill the builder with exactly `target_len` bytes read from `reader`.
    pub fn read_exact<R>(mut self, reader: &mut R) -> Result<Self, ReadError>
    where
        R: Read,
    {
        let mut buf = [0u8; CHUNK];
        let mut remaining = self.target_len;
        while remaining > 0 {
            let n = remaining.min(CHUNK);
            reader.read_exact(&mut buf[..n])?;
            self.data.extend_from_slice(&buf[..n]);
            remaining -= n;
        }
        Ok(self)
    }
}

impl<T> From<VecBuilder<T>> for Vec<T> {
    fn from(builder: VecBuilder<T>) -> Self {
        builder.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_exact_roundtrip() {
        let data = vec![1u8, 2, 3, 4, 5];
        let mut cursor = Cursor::new(data.clone());
        let builder = VecBuilder::new(data.len());
        let out: Vec<u8> = builder.read_exact(&mut cursor).unwrap().into();
        assert_eq!(out, data);
    }

    #[test]
    fn read_exact_short_buffer_errs() {
        let mut cursor = Cursor::new(vec![1u8, 2]);
        let builder = VecBuilder::new(10);
        assert!(builder.read_exact(&mut cursor).is_err());
    }

    #[test]
    fn push_grows_incrementally() {
        let mut builder = VecBuilder::new(3);
        builder.push(1);
        builder.push(2);
        builder.push(3);
        let out: Vec<i32> = builder.into();
        assert_eq!(out, vec![1, 2, 3]);
    }
}
