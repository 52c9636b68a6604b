use super::algorithm::HashAlg;

/// Scheme requested for a signing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigScheme {
    Ecdsa(HashAlg),
    RsaSsa(HashAlg),
}

impl SigScheme {
    pub fn hash(self) -> HashAlg {
        match self {
            SigScheme::Ecdsa(hash) | SigScheme::RsaSsa(hash) => hash,
        }
    }
}

/// Signature as returned by the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    Ecdsa { hash: HashAlg, r: Vec<u8>, s: Vec<u8> },
    RsaSsa { hash: HashAlg, sig: Vec<u8> },
}

impl Signature {
    pub fn scheme(&self) -> SigScheme {
        match self {
            Signature::Ecdsa { hash, .. } => SigScheme::Ecdsa(*hash),
            Signature::RsaSsa { hash, .. } => SigScheme::RsaSsa(*hash),
        }
    }
}
