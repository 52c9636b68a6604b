//! Algorithm identifiers understood by the security module

use std::fmt;
use std::str::FromStr;

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;

/// Wire identifiers for the algorithms that appear in public areas.
pub mod alg_id {
    pub const RSA: u16 = 0x0001;
    pub const SHA1: u16 = 0x0004;
    pub const HMAC: u16 = 0x0005;
    pub const AES: u16 = 0x0006;
    pub const KEYEDHASH: u16 = 0x0008;
    pub const SHA256: u16 = 0x000B;
    pub const SHA384: u16 = 0x000C;
    pub const SHA512: u16 = 0x000D;
    pub const NULL: u16 = 0x0010;
    pub const SM3_256: u16 = 0x0012;
    pub const RSASSA: u16 = 0x0014;
    pub const OAEP: u16 = 0x0017;
    pub const ECDSA: u16 = 0x0018;
    pub const ECC: u16 = 0x0023;
    pub const SYMCIPHER: u16 = 0x0025;
    pub const CTR: u16 = 0x0040;
    pub const OFB: u16 = 0x0041;
    pub const CBC: u16 = 0x0042;
    pub const CFB: u16 = 0x0043;
    pub const ECB: u16 = 0x0044;
}

/// Digest algorithm used for names, schemes and keyed hashes.
///
/// SM3-256 is recognised on the wire but has no implementation here, so any
/// attempt to compute with it fails with [`AlgorithmError::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlg {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Sm3_256,
}

impl HashAlg {
    /// Digests that can actually be computed.
    pub const IMPLEMENTED: [HashAlg; 4] = [
        HashAlg::Sha1,
        HashAlg::Sha256,
        HashAlg::Sha384,
        HashAlg::Sha512,
    ];

    pub const fn id(self) -> u16 {
        match self {
            HashAlg::Sha1 => alg_id::SHA1,
            HashAlg::Sha256 => alg_id::SHA256,
            HashAlg::Sha384 => alg_id::SHA384,
            HashAlg::Sha512 => alg_id::SHA512,
            HashAlg::Sm3_256 => alg_id::SM3_256,
        }
    }

    pub fn from_id(id: u16) -> Result<Self, AlgorithmError> {
        match id {
            alg_id::SHA1 => Ok(HashAlg::Sha1),
            alg_id::SHA256 => Ok(HashAlg::Sha256),
            alg_id::SHA384 => Ok(HashAlg::Sha384),
            alg_id::SHA512 => Ok(HashAlg::Sha512),
            alg_id::SM3_256 => Ok(HashAlg::Sm3_256),
            other => Err(AlgorithmError::UnknownId { id: other }),
        }
    }

    /// Output size in bytes
    pub const fn digest_size(self) -> usize {
        match self {
            HashAlg::Sha1 => 20,
            HashAlg::Sha256 | HashAlg::Sm3_256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }

    pub const fn is_implemented(self) -> bool {
        !matches!(self, HashAlg::Sm3_256)
    }

    pub fn ensure_implemented(self) -> Result<Self, AlgorithmError> {
        if self.is_implemented() {
            Ok(self)
        } else {
            Err(AlgorithmError::Unsupported {
                algorithm: self.to_string(),
            })
        }
    }

    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>, AlgorithmError> {
        self.digest_parts(&[data])
    }

    /// Digest of the concatenation of `parts`
    pub fn digest_parts(self, parts: &[&[u8]]) -> Result<Vec<u8>, AlgorithmError> {
        match self {
            HashAlg::Sha1 => Ok(digest_with::<Sha1>(parts)),
            HashAlg::Sha256 => Ok(digest_with::<Sha256>(parts)),
            HashAlg::Sha384 => Ok(digest_with::<Sha384>(parts)),
            HashAlg::Sha512 => Ok(digest_with::<Sha512>(parts)),
            HashAlg::Sm3_256 => Err(AlgorithmError::Unsupported {
                algorithm: self.to_string(),
            }),
        }
    }
}

fn digest_with<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlg::Sha1 => "sha1",
            HashAlg::Sha256 => "sha256",
            HashAlg::Sha384 => "sha384",
            HashAlg::Sha512 => "sha512",
            HashAlg::Sm3_256 => "sm3_256",
        };
        f.write_str(name)
    }
}

impl FromStr for HashAlg {
    type Err = AlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(HashAlg::Sha1),
            "sha256" => Ok(HashAlg::Sha256),
            "sha384" => Ok(HashAlg::Sha384),
            "sha512" => Ok(HashAlg::Sha512),
            "sm3" | "sm3_256" => Ok(HashAlg::Sm3_256),
            _ => Err(AlgorithmError::Unsupported {
                algorithm: s.to_string(),
            }),
        }
    }
}

/// Block cipher chaining mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymMode {
    Ctr,
    Ofb,
    Cbc,
    Cfb,
    Ecb,
}

impl SymMode {
    pub const fn id(self) -> u16 {
        match self {
            SymMode::Ctr => alg_id::CTR,
            SymMode::Ofb => alg_id::OFB,
            SymMode::Cbc => alg_id::CBC,
            SymMode::Cfb => alg_id::CFB,
            SymMode::Ecb => alg_id::ECB,
        }
    }

    pub fn from_id(id: u16) -> Result<Self, AlgorithmError> {
        match id {
            alg_id::CTR => Ok(SymMode::Ctr),
            alg_id::OFB => Ok(SymMode::Ofb),
            alg_id::CBC => Ok(SymMode::Cbc),
            alg_id::CFB => Ok(SymMode::Cfb),
            alg_id::ECB => Ok(SymMode::Ecb),
            other => Err(AlgorithmError::UnknownId { id: other }),
        }
    }
}

impl fmt::Display for SymMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymMode::Ctr => "CTR",
            SymMode::Ofb => "OFB",
            SymMode::Cbc => "CBC",
            SymMode::Cfb => "CFB",
            SymMode::Ecb => "ECB",
        };
        f.write_str(name)
    }
}

/// AES key definition used both for symmetric keys and for storage-parent wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymDef {
    pub key_bits: u16,
    pub mode: SymMode,
}

impl SymDef {
    pub const AES_128_CFB: SymDef = SymDef {
        key_bits: 128,
        mode: SymMode::Cfb,
    };

    pub const fn key_bytes(self) -> usize {
        self.key_bits as usize / 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccCurve {
    NistP256,
    NistP384,
}

impl EccCurve {
    pub const fn id(self) -> u16 {
        match self {
            EccCurve::NistP256 => 0x0003,
            EccCurve::NistP384 => 0x0004,
        }
    }

    pub fn from_id(id: u16) -> Result<Self, AlgorithmError> {
        match id {
            0x0003 => Ok(EccCurve::NistP256),
            0x0004 => Ok(EccCurve::NistP384),
            other => Err(AlgorithmError::UnknownId { id: other }),
        }
    }

    /// Coordinate size in bytes
    pub const fn coordinate_size(self) -> usize {
        match self {
            EccCurve::NistP256 => 32,
            EccCurve::NistP384 => 48,
        }
    }
}

impl fmt::Display for EccCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EccCurve::NistP256 => f.write_str("NIST P-256"),
            EccCurve::NistP384 => f.write_str("NIST P-384"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgorithmError {
    #[error("Algorithm not supported: {algorithm}")]
    Unsupported { algorithm: String },

    #[error("Unknown algorithm identifier {id:#06x}")]
    UnknownId { id: u16 },
}
