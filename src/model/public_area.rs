use super::algorithm::{AlgorithmError, HashAlg};
use super::attributes::ObjectAttributes;
use super::name::Name;
use super::template::{KeyParams, KeyTemplate, ObjectType, TemplateError};

/// Largest buffer accepted in any public-area field.
pub const MAX_PUBLIC_BUFFER: usize = 512;

/// Type-specific unique field: the public key or a digest binding the secret
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unique {
    Rsa { modulus: Vec<u8> },
    Ecc { x: Vec<u8>, y: Vec<u8> },
    SymCipher { digest: Vec<u8> },
    KeyedHash { digest: Vec<u8> },
}

impl Unique {
    /// Empty unique of the right shape for `object_type`
    pub fn empty(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Rsa => Unique::Rsa { modulus: Vec::new() },
            ObjectType::Ecc => Unique::Ecc {
                x: Vec::new(),
                y: Vec::new(),
            },
            ObjectType::SymCipher => Unique::SymCipher { digest: Vec::new() },
            ObjectType::KeyedHash => Unique::KeyedHash { digest: Vec::new() },
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Unique::Rsa { .. } => ObjectType::Rsa,
            Unique::Ecc { .. } => ObjectType::Ecc,
            Unique::SymCipher { .. } => ObjectType::SymCipher,
            Unique::KeyedHash { .. } => ObjectType::KeyedHash,
        }
    }

    fn buffers(&self) -> Vec<(&'static str, &[u8])> {
        match self {
            Unique::Rsa { modulus } => vec![("RSA modulus", modulus)],
            Unique::Ecc { x, y } => vec![("ECC x coordinate", x), ("ECC y coordinate", y)],
            Unique::SymCipher { digest } | Unique::KeyedHash { digest } => {
                vec![("unique digest", digest)]
            }
        }
    }
}

/// A template plus the unique field the module filled in.
///
/// Construction guarantees the unique field matches the parameter type and
/// that every buffer fits its wire length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicArea {
    template: KeyTemplate,
    unique: Unique,
}

impl PublicArea {
    pub fn new(template: KeyTemplate, unique: Unique) -> Result<Self, TemplateError> {
        let kind = template.object_type();
        if unique.object_type() != kind {
            return Err(TemplateError::UniqueMismatch { kind });
        }
        if template.auth_policy.len() > HashAlg::Sha512.digest_size() {
            return Err(TemplateError::BufferTooLarge {
                field: "auth policy",
                len: template.auth_policy.len(),
                max: HashAlg::Sha512.digest_size(),
            });
        }
        for (field, buffer) in unique.buffers() {
            if buffer.len() > MAX_PUBLIC_BUFFER {
                return Err(TemplateError::BufferTooLarge {
                    field,
                    len: buffer.len(),
                    max: MAX_PUBLIC_BUFFER,
                });
            }
        }
        Ok(Self { template, unique })
    }

    pub fn template(&self) -> &KeyTemplate {
        &self.template
    }

    pub fn name_alg(&self) -> HashAlg {
        self.template.name_alg
    }

    pub fn attributes(&self) -> ObjectAttributes {
        self.template.attributes
    }

    pub fn auth_policy(&self) -> &[u8] {
        &self.template.auth_policy
    }

    pub fn params(&self) -> &KeyParams {
        &self.template.params
    }

    pub fn unique(&self) -> &Unique {
        &self.unique
    }

    pub fn object_type(&self) -> ObjectType {
        self.template.object_type()
    }

    pub fn is_restricted(&self) -> bool {
        self.template.attributes.is_restricted()
    }

    pub fn is_storage_parent(&self) -> bool {
        self.template.is_storage_parent()
    }

    pub fn is_sealed_data(&self) -> bool {
        self.template.is_sealed_data()
    }

    /// Name of the object this public area describes
    pub fn name(&self) -> Result<Name, AlgorithmError> {
        Name::compute(self)
    }
}

impl KeyTemplate {
    /// Public area with an empty unique field, as sent to the module
    pub fn to_public(&self) -> PublicArea {
        PublicArea {
            unique: Unique::empty(self.object_type()),
            template: self.clone(),
        }
    }
}
