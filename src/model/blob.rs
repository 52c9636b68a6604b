use std::fmt;

use thiserror::Error;

use super::public_area::PublicArea;

/// Opaque private area produced by the module.
///
/// Only the module that created it under the same parent can use it; the
/// host treats it as bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateBlob(Vec<u8>);

impl PrivateBlob {
    pub const MAX_SIZE: usize = u16::MAX as usize;

    pub fn new(bytes: Vec<u8>) -> Result<Self, PrivateBlobError> {
        if bytes.is_empty() {
            return Err(PrivateBlobError::Empty);
        }
        if bytes.len() > Self::MAX_SIZE {
            return Err(PrivateBlobError::TooLarge { len: bytes.len() });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PrivateBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateBlob({} bytes)", self.0.len())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivateBlobError {
    #[error("private area is empty")]
    Empty,

    #[error("private area of {len} bytes does not fit a 16-bit length prefix")]
    TooLarge { len: usize },
}

/// At-rest form of a child object: its public area and wrapped private area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlob {
    public: PublicArea,
    private: PrivateBlob,
}

impl KeyBlob {
    pub fn new(public: PublicArea, private: PrivateBlob) -> Self {
        Self { public, private }
    }

    pub fn public(&self) -> &PublicArea {
        &self.public
    }

    pub fn private(&self) -> &PrivateBlob {
        &self.private
    }
}
