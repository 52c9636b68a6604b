use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Password authorizing use of an object
#[derive(Clone, PartialEq, Eq, Default, Zeroize, ZeroizeOnDrop)]
pub struct AuthValue(Vec<u8>);

impl AuthValue {
    /// No name algorithm produces a digest longer than this.
    pub const MAX_LENGTH: usize = 64;

    pub fn new(auth: Vec<u8>) -> Result<Self, AuthValueError> {
        if auth.len() > Self::MAX_LENGTH {
            return Err(AuthValueError::TooLong {
                max: Self::MAX_LENGTH,
                actual: auth.len(),
            });
        }
        Ok(Self(auth))
    }

    pub fn from_str(auth: &str) -> Result<Self, AuthValueError> {
        Self::new(auth.as_bytes().to_vec())
    }

    pub fn empty() -> Self {
        Self(Vec::new())
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

impl fmt::Debug for AuthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthValue([REDACTED])")
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthValueError {
    #[error("Auth value must be at most {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error("Auth value of {actual} bytes is longer than the {max}-byte name digest")]
    LongerThanNameDigest { max: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_valid() {
        assert!(AuthValue::from_str("hunter2").is_ok());
        assert!(AuthValue::new(vec![7; AuthValue::MAX_LENGTH]).is_ok());
        assert!(AuthValue::empty().is_empty());
    }

    #[test]
    fn test_auth_too_long() {
        assert_eq!(
            AuthValue::new(vec![0; 65]).unwrap_err(),
            AuthValueError::TooLong {
                max: 64,
                actual: 65
            }
        );
    }

    #[test]
    fn test_auth_debug_redacted() {
        let auth = AuthValue::from_str("correct horse").unwrap();
        let debug_str = format!("{:?}", auth);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("horse"));
    }
}
