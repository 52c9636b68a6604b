//! Fixed catalog of key templates

use std::fmt;
use std::str::FromStr;

use super::algorithm::{AlgorithmError, EccCurve, HashAlg, SymDef};
use super::attributes::ObjectAttributes;
use super::template::{
    EccParams, EccScheme, KeyParams, KeyTemplate, KeyedHashParams, KeyedHashScheme, RsaParams,
};

const FIXED: ObjectAttributes = ObjectAttributes::FIXED_TPM.union(ObjectAttributes::FIXED_PARENT);

const GENERATED: ObjectAttributes = FIXED
    .union(ObjectAttributes::SENSITIVE_DATA_ORIGIN)
    .union(ObjectAttributes::USER_WITH_AUTH);

const STORAGE: ObjectAttributes = GENERATED
    .union(ObjectAttributes::NO_DA)
    .union(ObjectAttributes::RESTRICTED)
    .union(ObjectAttributes::DECRYPT);

/// ECC P-256 storage parent wrapping children with AES-128-CFB
pub fn ecc_storage_parent() -> KeyTemplate {
    KeyTemplate::new(
        HashAlg::Sha256,
        STORAGE,
        KeyParams::Ecc(EccParams {
            symmetric: Some(SymDef::AES_128_CFB),
            scheme: None,
            curve: EccCurve::NistP256,
        }),
    )
}

/// RSA-2048 storage parent wrapping children with AES-128-CFB
pub fn rsa_storage_parent() -> KeyTemplate {
    KeyTemplate::new(
        HashAlg::Sha256,
        STORAGE,
        KeyParams::Rsa(RsaParams {
            symmetric: Some(SymDef::AES_128_CFB),
            scheme: None,
            key_bits: 2048,
            exponent: 0,
        }),
    )
}

/// Unrestricted ECDSA P-256 signer; signs any digest
pub fn ecc_signer() -> KeyTemplate {
    KeyTemplate::new(
        HashAlg::Sha256,
        GENERATED | ObjectAttributes::SIGN,
        KeyParams::Ecc(EccParams {
            symmetric: None,
            scheme: Some(EccScheme::Ecdsa(HashAlg::Sha256)),
            curve: EccCurve::NistP256,
        }),
    )
}

/// Restricted ECDSA P-256 signer; only signs digests the module computed itself
pub fn ecc_restricted_signer() -> KeyTemplate {
    let mut template = ecc_signer();
    template.attributes = template.attributes | ObjectAttributes::RESTRICTED;
    template
}

/// RSA-2048 key for OAEP decryption
pub fn rsa_decrypt() -> KeyTemplate {
    KeyTemplate::new(
        HashAlg::Sha256,
        GENERATED | ObjectAttributes::NO_DA | ObjectAttributes::DECRYPT | ObjectAttributes::SIGN,
        KeyParams::Rsa(RsaParams {
            symmetric: None,
            scheme: None,
            key_bits: 2048,
            exponent: 0,
        }),
    )
}

/// AES-128 key restricted to CFB mode
pub fn aes128_cfb() -> KeyTemplate {
    KeyTemplate::new(
        HashAlg::Sha256,
        GENERATED | ObjectAttributes::DECRYPT | ObjectAttributes::SIGN,
        KeyParams::SymCipher(SymDef::AES_128_CFB),
    )
}

/// Keyed-hash object carrying caller-supplied data
pub fn sealed_data(name_alg: HashAlg) -> Result<KeyTemplate, AlgorithmError> {
    Ok(KeyTemplate::new(
        name_alg.ensure_implemented()?,
        FIXED | ObjectAttributes::USER_WITH_AUTH | ObjectAttributes::NO_DA,
        KeyParams::KeyedHash(KeyedHashParams { scheme: None }),
    ))
}

/// Keyed-hash HMAC key whose name algorithm matches the digest
pub fn hmac_key(hash: HashAlg) -> Result<KeyTemplate, AlgorithmError> {
    Ok(KeyTemplate::new(
        hash.ensure_implemented()?,
        GENERATED | ObjectAttributes::SIGN,
        KeyParams::KeyedHash(KeyedHashParams {
            scheme: Some(KeyedHashScheme::Hmac(hash)),
        }),
    ))
}

/// Kinds of child key the command line can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyKind {
    #[default]
    Signer,
    RestrictedSigner,
    Decrypt,
    Symmetric,
}

impl KeyKind {
    pub fn template(self) -> KeyTemplate {
        match self {
            KeyKind::Signer => ecc_signer(),
            KeyKind::RestrictedSigner => ecc_restricted_signer(),
            KeyKind::Decrypt => rsa_decrypt(),
            KeyKind::Symmetric => aes128_cfb(),
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyKind::Signer => "signer",
            KeyKind::RestrictedSigner => "restricted-signer",
            KeyKind::Decrypt => "decrypt",
            KeyKind::Symmetric => "symmetric",
        };
        f.write_str(name)
    }
}

impl FromStr for KeyKind {
    type Err = AlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signer" => Ok(KeyKind::Signer),
            "restricted-signer" => Ok(KeyKind::RestrictedSigner),
            "decrypt" => Ok(KeyKind::Decrypt),
            "symmetric" => Ok(KeyKind::Symmetric),
            other => Err(AlgorithmError::Unsupported {
                algorithm: other.to_string(),
            }),
        }
    }
}
