//! Key templates: the public-area shape a caller asks the module to instantiate

use std::fmt;

use thiserror::Error;

use super::algorithm::{AlgorithmError, EccCurve, HashAlg, SymDef};
use super::attributes::ObjectAttributes;

/// Object type selector of a public area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Rsa,
    Ecc,
    SymCipher,
    KeyedHash,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Rsa => "RSA",
            ObjectType::Ecc => "ECC",
            ObjectType::SymCipher => "symmetric cipher",
            ObjectType::KeyedHash => "keyed hash",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RsaScheme {
    RsaSsa(HashAlg),
    Oaep(HashAlg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccScheme {
    Ecdsa(HashAlg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyedHashScheme {
    Hmac(HashAlg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RsaParams {
    pub symmetric: Option<SymDef>,
    pub scheme: Option<RsaScheme>,
    pub key_bits: u16,
    /// Zero selects the default exponent 65537
    pub exponent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EccParams {
    pub symmetric: Option<SymDef>,
    pub scheme: Option<EccScheme>,
    pub curve: EccCurve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyedHashParams {
    pub scheme: Option<KeyedHashScheme>,
}

/// Type-specific parameters of a public area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyParams {
    Rsa(RsaParams),
    Ecc(EccParams),
    SymCipher(SymDef),
    KeyedHash(KeyedHashParams),
}

impl KeyParams {
    pub fn object_type(&self) -> ObjectType {
        match self {
            KeyParams::Rsa(_) => ObjectType::Rsa,
            KeyParams::Ecc(_) => ObjectType::Ecc,
            KeyParams::SymCipher(_) => ObjectType::SymCipher,
            KeyParams::KeyedHash(_) => ObjectType::KeyedHash,
        }
    }

    /// Wrapping algorithm of a storage key
    pub fn symmetric(&self) -> Option<SymDef> {
        match self {
            KeyParams::Rsa(p) => p.symmetric,
            KeyParams::Ecc(p) => p.symmetric,
            KeyParams::SymCipher(_) | KeyParams::KeyedHash(_) => None,
        }
    }

    /// Digest named by the signing, decryption or HMAC scheme
    pub fn scheme_hash(&self) -> Option<HashAlg> {
        match self {
            KeyParams::Rsa(RsaParams {
                scheme: Some(RsaScheme::RsaSsa(h) | RsaScheme::Oaep(h)),
                ..
            }) => Some(*h),
            KeyParams::Ecc(EccParams {
                scheme: Some(EccScheme::Ecdsa(h)),
                ..
            }) => Some(*h),
            KeyParams::KeyedHash(KeyedHashParams {
                scheme: Some(KeyedHashScheme::Hmac(h)),
            }) => Some(*h),
            _ => None,
        }
    }

    fn has_scheme(&self) -> bool {
        match self {
            KeyParams::Rsa(p) => p.scheme.is_some(),
            KeyParams::Ecc(p) => p.scheme.is_some(),
            KeyParams::KeyedHash(p) => p.scheme.is_some(),
            KeyParams::SymCipher(_) => false,
        }
    }
}

/// The public shape of an object before the module fills in its unique field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyTemplate {
    pub name_alg: HashAlg,
    pub attributes: ObjectAttributes,
    pub auth_policy: Vec<u8>,
    pub params: KeyParams,
}

impl KeyTemplate {
    pub fn new(name_alg: HashAlg, attributes: ObjectAttributes, params: KeyParams) -> Self {
        Self {
            name_alg,
            attributes,
            auth_policy: Vec::new(),
            params,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.params.object_type()
    }

    pub fn is_storage_parent(&self) -> bool {
        self.attributes.is_storage()
    }

    pub fn is_restricted_signer(&self) -> bool {
        self.attributes.is_restricted() && self.attributes.can_sign()
    }

    /// Sealed data objects are keyed-hash objects with no usage of their own.
    pub fn is_sealed_data(&self) -> bool {
        matches!(self.params, KeyParams::KeyedHash(KeyedHashParams { scheme: None }))
            && !self.attributes.can_sign()
            && !self.attributes.can_decrypt()
    }

    /// Checks the attribute and parameter combinations the module refuses.
    pub fn validate(&self) -> Result<(), TemplateError> {
        self.name_alg.ensure_implemented()?;
        if let Some(hash) = self.params.scheme_hash() {
            hash.ensure_implemented()?;
        }

        let attrs = self.attributes;
        if attrs.contains(ObjectAttributes::FIXED_TPM)
            && !attrs.contains(ObjectAttributes::FIXED_PARENT)
        {
            return Err(TemplateError::FixedTpmWithoutFixedParent);
        }
        if !self.auth_policy.is_empty() && self.auth_policy.len() != self.name_alg.digest_size() {
            return Err(TemplateError::AuthPolicySize {
                expected: self.name_alg.digest_size(),
                actual: self.auth_policy.len(),
            });
        }
        if attrs.is_restricted() && attrs.can_sign() && attrs.can_decrypt() {
            return Err(TemplateError::RestrictedSignAndDecrypt);
        }

        match self.params {
            KeyParams::Rsa(p) => {
                if p.key_bits != 2048 {
                    return Err(AlgorithmError::Unsupported {
                        algorithm: format!("RSA-{}", p.key_bits),
                    }
                    .into());
                }
                if p.exponent != 0 && p.exponent != 65537 {
                    return Err(TemplateError::UnsupportedExponent { exponent: p.exponent });
                }
            }
            KeyParams::Ecc(p) => {
                if p.curve != EccCurve::NistP256 {
                    return Err(AlgorithmError::Unsupported {
                        algorithm: p.curve.to_string(),
                    }
                    .into());
                }
                if matches!(p.scheme, Some(EccScheme::Ecdsa(_))) && !attrs.can_sign() {
                    return Err(TemplateError::SchemeWithoutUsage);
                }
            }
            KeyParams::SymCipher(def) => {
                check_sym_def(def)?;
                if !attrs.can_sign() && !attrs.can_decrypt() {
                    return Err(TemplateError::NoUsage {
                        kind: ObjectType::SymCipher,
                    });
                }
            }
            KeyParams::KeyedHash(p) => {
                if p.scheme.is_some() && !attrs.can_sign() {
                    return Err(TemplateError::SchemeWithoutUsage);
                }
                if attrs.can_decrypt() {
                    return Err(TemplateError::KeyedHashDecrypt);
                }
                if self.is_sealed_data() && attrs.contains(ObjectAttributes::SENSITIVE_DATA_ORIGIN)
                {
                    return Err(TemplateError::SealedDataWithGeneratedOrigin);
                }
            }
        }

        if let Some(def) = self.params.symmetric() {
            if !attrs.is_storage() {
                return Err(TemplateError::SymmetricOnNonStorage);
            }
            check_sym_def(def)?;
        }
        if attrs.is_storage() && self.object_type() != ObjectType::SymCipher {
            if self.params.symmetric().is_none() {
                return Err(TemplateError::StorageWithoutSymmetric);
            }
            if self.params.has_scheme() {
                return Err(TemplateError::StorageWithScheme);
            }
        }
        if attrs.is_restricted() && attrs.can_sign() && !self.params.has_scheme() {
            return Err(TemplateError::RestrictedSignerWithoutScheme);
        }
        Ok(())
    }
}

fn check_sym_def(def: SymDef) -> Result<(), TemplateError> {
    if def.key_bits != 128 && def.key_bits != 256 {
        return Err(AlgorithmError::Unsupported {
            algorithm: format!("AES-{}", def.key_bits),
        }
        .into());
    }
    Ok(())
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("fixedTPM requires fixedParent")]
    FixedTpmWithoutFixedParent,

    #[error("a restricted key cannot both sign and decrypt")]
    RestrictedSignAndDecrypt,

    #[error("{kind} objects must allow signing or decryption")]
    NoUsage { kind: ObjectType },

    #[error("a scheme is set but the attributes do not allow its use")]
    SchemeWithoutUsage,

    #[error("keyed-hash objects cannot decrypt")]
    KeyedHashDecrypt,

    #[error("sealed data must come from the caller, not from sensitiveDataOrigin")]
    SealedDataWithGeneratedOrigin,

    #[error("symmetric wrapping is only valid on a restricted decryption key")]
    SymmetricOnNonStorage,

    #[error("a storage key must define its symmetric wrapping algorithm")]
    StorageWithoutSymmetric,

    #[error("a storage key cannot carry a signing or encryption scheme")]
    StorageWithScheme,

    #[error("a restricted signing key must define its signing scheme")]
    RestrictedSignerWithoutScheme,

    #[error("unsupported RSA exponent {exponent}")]
    UnsupportedExponent { exponent: u32 },

    #[error("auth policy of {actual} bytes does not match the {expected}-byte name digest")]
    AuthPolicySize { expected: usize, actual: usize },

    #[error("{field} of {len} bytes exceeds the {max}-byte limit")]
    BufferTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("unique field does not match a {kind} object")]
    UniqueMismatch { kind: ObjectType },

    #[error(transparent)]
    Algorithm(#[from] AlgorithmError),
}
