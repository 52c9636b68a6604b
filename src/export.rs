//! Host-side view of module public keys
//!
//! Exported keys are SubjectPublicKeyInfo in a `PUBLIC KEY` PEM block. Only
//! RSA and ECC objects have one; symmetric and keyed-hash objects never leave
//! the module in any form.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature as EcdsaSignature, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use rsa::{BigUint, Oaep, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{TpmKeysError, TpmKeysResult};
use crate::model::{EccCurve, EccParams, KeyParams, PublicArea, RsaParams, Signature, Unique};

const DEFAULT_RSA_EXPONENT: u32 = 65537;

const P256_COORDINATE: usize = 32;

fn key_format(reason: impl Into<String>) -> TpmKeysError {
    TpmKeysError::KeyFormat {
        reason: reason.into(),
    }
}

/// Public half of an asymmetric module key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ecc(p256::PublicKey),
}

impl PublicKey {
    /// Rebuilds the public key from the unique field of a public area.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::KeyFormat`] for objects without an exportable public
    /// key and for unique fields that are not a valid key.
    pub fn from_public_area(public: &PublicArea) -> TpmKeysResult<Self> {
        match (public.params(), public.unique()) {
            (KeyParams::Rsa(RsaParams { exponent, .. }), Unique::Rsa { modulus }) => {
                let exponent = match *exponent {
                    0 => DEFAULT_RSA_EXPONENT,
                    e => e,
                };
                let key = RsaPublicKey::new(
                    BigUint::from_bytes_be(modulus),
                    BigUint::from(exponent),
                )
                .map_err(|err| key_format(format!("RSA public key: {err}")))?;
                Ok(PublicKey::Rsa(key))
            }
            (
                KeyParams::Ecc(EccParams {
                    curve: EccCurve::NistP256,
                    ..
                }),
                Unique::Ecc { x, y },
            ) => {
                let mut point = Vec::with_capacity(1 + 2 * P256_COORDINATE);
                point.push(0x04);
                point.extend_from_slice(&left_pad(x, P256_COORDINATE)?);
                point.extend_from_slice(&left_pad(y, P256_COORDINATE)?);
                let key = p256::PublicKey::from_sec1_bytes(&point)
                    .map_err(|_| key_format("ECC point is not on NIST P-256"))?;
                Ok(PublicKey::Ecc(key))
            }
            (KeyParams::Ecc(EccParams { curve, .. }), _) => {
                Err(key_format(format!("no export for {curve} keys")))
            }
            _ => Err(key_format(format!(
                "{} objects have no public key",
                public.object_type()
            ))),
        }
    }

    pub fn to_pem(&self) -> TpmKeysResult<String> {
        let pem = match self {
            PublicKey::Rsa(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::Ecc(key) => key.to_public_key_pem(LineEnding::LF),
        };
        pem.map_err(|err| key_format(err.to_string()))
    }

    /// Parses a `PUBLIC KEY` PEM block holding a P-256 or RSA key.
    pub fn from_pem(pem: &str) -> TpmKeysResult<Self> {
        if let Ok(key) = p256::PublicKey::from_public_key_pem(pem) {
            return Ok(PublicKey::Ecc(key));
        }
        RsaPublicKey::from_public_key_pem(pem)
            .map(PublicKey::Rsa)
            .map_err(|_| key_format("expected a P-256 or RSA public key in a PUBLIC KEY block"))
    }

    /// Checks a signature over `message` as produced by [`Signature::to_der`].
    ///
    /// ECDSA-P256 and RSASSA-PKCS1-v1_5, both with SHA-256. A signature that
    /// does not verify is `Ok(false)`; one that cannot be parsed is an error.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> TpmKeysResult<bool> {
        match self {
            PublicKey::Ecc(key) => {
                let signature = EcdsaSignature::from_der(signature)
                    .map_err(|_| key_format("ECDSA signature is not valid DER"))?;
                Ok(VerifyingKey::from(key).verify(message, &signature).is_ok())
            }
            PublicKey::Rsa(key) => {
                let digest = Sha256::digest(message);
                Ok(key
                    .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                    .is_ok())
            }
        }
    }

    /// RSA-OAEP-SHA256 encryption, for ciphertexts the module decrypts.
    pub fn encrypt_oaep(&self, plaintext: &[u8]) -> TpmKeysResult<Vec<u8>> {
        let PublicKey::Rsa(key) = self else {
            return Err(key_format("only RSA keys encrypt"));
        };
        key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|err| key_format(format!("RSA-OAEP: {err}")))
    }
}

impl Signature {
    /// DER `SEQUENCE { r, s }` for ECDSA; RSA signatures are already opaque bytes.
    pub fn to_der(&self) -> TpmKeysResult<Vec<u8>> {
        match self {
            Signature::Ecdsa { r, s, .. } => {
                let mut raw = left_pad(r, P256_COORDINATE)?;
                raw.extend_from_slice(&left_pad(s, P256_COORDINATE)?);
                let signature = EcdsaSignature::from_slice(&raw)
                    .map_err(|_| key_format("ECDSA signature scalars out of range"))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            Signature::RsaSsa { sig, .. } => Ok(sig.clone()),
        }
    }
}

fn left_pad(bytes: &[u8], size: usize) -> TpmKeysResult<Vec<u8>> {
    if bytes.len() > size {
        return Err(key_format(format!(
            "{}-byte value exceeds {size} bytes",
            bytes.len()
        )));
    }
    let mut padded = vec![0u8; size - bytes.len()];
    padded.extend_from_slice(bytes);
    Ok(padded)
}
