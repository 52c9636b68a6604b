//! Object names: the cryptographic identity of a public area

use std::fmt;

use super::algorithm::{AlgorithmError, HashAlg};
use super::public_area::PublicArea;
use crate::codec::marshal_public;

/// `nameAlg` identifier (big-endian) followed by the digest of the marshaled
/// public area.
///
/// Two objects share a name exactly when their public areas marshal to the
/// same bytes, so a name check catches a handle that now points elsewhere.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(Vec<u8>);

impl Name {
    pub fn compute(public: &PublicArea) -> Result<Self, AlgorithmError> {
        let alg = public.name_alg();
        let digest = alg.digest(&marshal_public(public))?;
        let mut bytes = Vec::with_capacity(2 + digest.len());
        bytes.extend_from_slice(&alg.id().to_be_bytes());
        bytes.extend_from_slice(&digest);
        Ok(Self(bytes))
    }

    /// Accepts only well-formed names: a known algorithm and a digest of its size.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AlgorithmError> {
        let Some(id) = bytes.get(..2) else {
            return Err(AlgorithmError::Unsupported {
                algorithm: "empty name".to_string(),
            });
        };
        let alg = HashAlg::from_id(u16::from_be_bytes([id[0], id[1]]))?;
        if bytes.len() != 2 + alg.digest_size() {
            return Err(AlgorithmError::Unsupported {
                algorithm: format!("{}-byte {} name", bytes.len(), alg),
            });
        }
        Ok(Self(bytes))
    }

    pub fn name_alg(&self) -> Option<HashAlg> {
        HashAlg::from_id(u16::from_be_bytes([self.0[0], self.0[1]])).ok()
    }

    pub fn digest(&self) -> &[u8] {
        &self.0[2..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.to_hex())
    }
}
