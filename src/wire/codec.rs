use byteorder::{BigEndian, ByteOrder};

use crate::error::SqlBridgeError;

/// Bounds-checked cursor over a big-endian wire payload.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Borrow the next `len` bytes and advance past them.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::DecodeError` if fewer than `len` bytes remain.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], SqlBridgeError> {
        if self.remaining() < len {
            return Err(SqlBridgeError::DecodeError(format!(
                "need {len} bytes at offset {}, only {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, SqlBridgeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, SqlBridgeError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_u16(&mut self) -> Result<u16, SqlBridgeError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, SqlBridgeError> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, SqlBridgeError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_i64(&mut self) -> Result<i64, SqlBridgeError> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, SqlBridgeError> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, SqlBridgeError> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    /// Fail unless the whole payload was consumed.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::DecodeError` when trailing bytes remain.
    pub fn finish(&self) -> Result<(), SqlBridgeError> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(SqlBridgeError::DecodeError(format!(
                "{} trailing bytes after offset {}",
                self.remaining(),
                self.pos
            )))
        }
    }
}

/// Append-only big-endian encoder.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_i16(&mut self, value: i16) {
        let mut b = [0u8; 2];
        BigEndian::write_i16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_u16(&mut self, value: u16) {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_i32(&mut self, value: i32) {
        let mut b = [0u8; 4];
        BigEndian::write_i32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_u32(&mut self, value: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_i64(&mut self, value: i64) {
        let mut b = [0u8; 8];
        BigEndian::write_i64(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_f64(&mut self, value: f64) {
        let mut b = [0u8; 8];
        BigEndian::write_f64(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
