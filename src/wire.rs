//! Length-prefixed binary codec used by the SSH family of formats
//!
//! Layout follows RFC 4251 section 5:
//! - `uint32`: 4 bytes, big-endian
//! - `string`: uint32 length followed by that many bytes
//! - `mpint`: a string holding a two's complement big-endian integer
//!
//! A buffer is either built over existing bytes for decoding (cursor at 0)
//! or created empty for encoding. Every slice handed out is a copy, so the
//! backing store can grow while earlier results are still alive.

use crate::error::{KeyforgeError, Result};

/// Initial backing size for an encoding buffer
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct WireBuffer {
    buffer: Vec<u8>,
    offset: usize,
}

impl WireBuffer {
    /// Empty buffer for encoding
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity.max(1)],
            offset: 0,
        }
    }

    /// Buffer over existing bytes for decoding
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            buffer: data.to_vec(),
            offset: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the backing store, including unwritten space
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Exactly the bytes written so far
    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer[..self.offset].to_vec()
    }

    pub fn at_end(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    /// Everything after the cursor
    pub fn remainder(&self) -> Vec<u8> {
        self.buffer[self.offset.min(self.buffer.len())..].to_vec()
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure_available(n)?;
        self.offset += n;
        Ok(())
    }

    fn available(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    fn ensure_available(&self, needed: usize) -> Result<()> {
        if needed > self.available() {
            return Err(KeyforgeError::OutOfBounds {
                offset: self.offset,
                needed,
                available: self.available(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.ensure_available(n)?;
        let start = self.offset;
        self.offset += n;
        Ok(&self.buffer[start..start + n])
    }

    pub fn read_buffer(&mut self) -> Result<Vec<u8>> {
        let len = self.read_int()? as usize;
        if let Err(err) = self.ensure_available(len) {
            // leave the cursor on the length field
            self.offset -= 4;
            return Err(err);
        }
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.read_buffer()?)?)
    }

    /// NUL-terminated string; the terminator is consumed
    pub fn read_cstring(&mut self) -> Result<String> {
        let start = self.offset;
        let end = self.buffer[start.min(self.buffer.len())..]
            .iter()
            .position(|&b| b == 0)
            .map(|pos| start + pos)
            .ok_or(KeyforgeError::UnterminatedString(start))?;
        let s = String::from_utf8(self.buffer[start..end].to_vec())?;
        self.offset = end + 1;
        Ok(s)
    }

    pub fn read_int(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// The raw 8-byte big-endian value, uninterpreted
    pub fn read_int64(&mut self) -> Result<[u8; 8]> {
        let bytes = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_char(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn expand(&mut self) {
        let size = self.buffer.len().max(1) * 2;
        self.buffer.resize(size, 0);
    }

    fn reserve(&mut self, n: usize) {
        while self.offset + n > self.buffer.len() {
            self.expand();
        }
    }

    /// Raw bytes with no length prefix
    pub fn write(&mut self, data: &[u8]) {
        self.reserve(data.len());
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
    }

    pub fn write_buffer(&mut self, data: &[u8]) {
        self.reserve(4 + data.len());
        self.write_int(data.len() as u32);
        self.write(data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_buffer(s.as_bytes());
    }

    pub fn write_cstring(&mut self, s: &str) {
        self.reserve(s.len() + 1);
        self.write(s.as_bytes());
        self.write_char(0);
    }

    pub fn write_int(&mut self, v: u32) {
        self.write(&v.to_be_bytes());
    }

    /// Writes an 8-byte big-endian value. Longer input is accepted only when
    /// every byte above the low 8 is zero; shorter input is left-padded.
    pub fn write_int64(&mut self, v: &[u8]) -> Result<()> {
        let v = if v.len() > 8 {
            let (lead, low) = v.split_at(v.len() - 8);
            if lead.iter().any(|&b| b != 0) {
                return Err(KeyforgeError::Int64Overflow);
            }
            low
        } else {
            v
        };
        let mut out = [0u8; 8];
        out[8 - v.len()..].copy_from_slice(v);
        self.write(&out);
        Ok(())
    }

    pub fn write_char(&mut self, v: u8) {
        self.write(&[v]);
    }
}

impl Default for WireBuffer {
    fn default() -> Self {
        Self::new()
    }
}
