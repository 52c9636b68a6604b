//! Big-endian wire encoding of public areas and key blobs

mod blob;
mod envelope;
mod public;

pub use blob::{decode_key_blob, encode_key_blob};
pub use envelope::EncryptedBlob;
pub use public::{marshal_public, unmarshal_public};

pub(crate) use public::{read_public, write_public};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input at offset {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    #[error("{len} trailing bytes after the last structure")]
    TrailingBytes { len: usize },

    #[error("unknown {field} value {value:#06x}")]
    UnknownValue { field: &'static str, value: u32 },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Append-only big-endian writer
#[derive(Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Length-prefixed buffer. Callers keep buffers under 64 KiB; the model
    /// types enforce this on construction.
    pub fn sized(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= u16::MAX as usize);
        let len = data.len().min(u16::MAX as usize);
        self.u16(len as u16);
        self.buf.extend_from_slice(&data[..len]);
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked big-endian reader that never panics on malformed input
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.data.len() - self.pos;
        if n > remaining {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn sized(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    /// Everything not yet consumed
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    /// Fails if any input is left over.
    pub fn finish(self) -> Result<(), CodecError> {
        let len = self.data.len() - self.pos;
        if len > 0 {
            return Err(CodecError::TrailingBytes { len });
        }
        Ok(())
    }
}
