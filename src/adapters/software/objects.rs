//! Object material: generation, binding and protection under a parent

use p256::ecdsa::SigningKey;
use rand::{CryptoRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::crypto;
use crate::codec::{CodecError, Reader, Writer};
use crate::model::{
    HashAlg, Hierarchy, KeyParams, KeyTemplate, Name, ObjectAttributes, PrivateBlob, PublicArea,
    SensitiveCreate, Unique,
};
use crate::ports::ResponseCode;

const STORAGE_LABEL: &[u8] = b"STORAGE";
const INTEGRITY_LABEL: &[u8] = b"INTEGRITY";
const ECC_ATTEMPTS: usize = 64;

/// Secret half of an object
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub(super) struct Sensitive {
    pub auth: Vec<u8>,
    /// Protection seed for storage keys, obfuscation value for symmetric objects
    pub seed: Vec<u8>,
    /// Private scalar, PKCS#8 DER, symmetric key or sealed data
    pub material: Vec<u8>,
}

impl Sensitive {
    pub fn marshal(&self) -> Zeroizing<Vec<u8>> {
        let mut w = Writer::new();
        w.sized(&self.auth);
        w.sized(&self.seed);
        w.sized(&self.material);
        Zeroizing::new(w.into_bytes())
    }

    pub fn unmarshal(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let sensitive = Sensitive {
            auth: r.sized()?.to_vec(),
            seed: r.sized()?.to_vec(),
            material: r.sized()?.to_vec(),
        };
        r.finish()?;
        Ok(sensitive)
    }
}

/// A loaded object: public area, its name, secrets and owning hierarchy
#[derive(Clone)]
pub(super) struct Object {
    pub public: PublicArea,
    pub name: Name,
    pub sensitive: Sensitive,
    pub hierarchy: Hierarchy,
}

/// Creates the secret material for `template` and the public area it implies.
pub(super) fn generate<R: RngCore + CryptoRng>(
    template: &KeyTemplate,
    sensitive: &SensitiveCreate,
    rng: &mut R,
) -> Result<(PublicArea, Sensitive), ResponseCode> {
    let mut seed = vec![0u8; template.name_alg.digest_size()];
    rng.fill_bytes(&mut seed);

    let material = match template.params {
        KeyParams::Ecc(_) => generate_ecc_scalar(rng)?,
        KeyParams::Rsa(params) => {
            let key = RsaPrivateKey::new(rng, params.key_bits as usize)
                .map_err(|_| ResponseCode::KeySize)?;
            key.to_pkcs8_der()
                .map_err(|_| ResponseCode::Value)?
                .as_bytes()
                .to_vec()
        }
        KeyParams::SymCipher(def) => {
            let mut key = vec![0u8; def.key_bytes()];
            rng.fill_bytes(&mut key);
            key
        }
        KeyParams::KeyedHash(_) => {
            if template
                .attributes
                .contains(ObjectAttributes::SENSITIVE_DATA_ORIGIN)
            {
                let mut key = vec![0u8; template.name_alg.digest_size()];
                rng.fill_bytes(&mut key);
                key
            } else {
                sensitive.data().to_vec()
            }
        }
    };

    let secrets = Sensitive {
        auth: sensitive.user_auth().as_bytes().to_vec(),
        seed,
        material,
    };
    let unique = unique_for(template, &secrets)?;
    let public = PublicArea::new(template.clone(), unique).map_err(|_| ResponseCode::Size)?;
    Ok((public, secrets))
}

fn generate_ecc_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Vec<u8>, ResponseCode> {
    for _ in 0..ECC_ATTEMPTS {
        let mut candidate = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(&mut candidate[..]);
        if SigningKey::from_slice(&candidate[..]).is_ok() {
            return Ok(candidate.to_vec());
        }
    }
    Err(ResponseCode::Value)
}

/// Unique field implied by the secrets; also the binding check on load.
pub(super) fn unique_for(
    template: &KeyTemplate,
    sensitive: &Sensitive,
) -> Result<Unique, ResponseCode> {
    match template.params {
        KeyParams::Ecc(_) => {
            let key = SigningKey::from_slice(&sensitive.material).map_err(|_| ResponseCode::Binding)?;
            let point = key.verifying_key().to_encoded_point(false);
            let (x, y) = match (point.x(), point.y()) {
                (Some(x), Some(y)) => (x.to_vec(), y.to_vec()),
                _ => return Err(ResponseCode::Binding),
            };
            Ok(Unique::Ecc { x, y })
        }
        KeyParams::Rsa(_) => {
            let key = RsaPrivateKey::from_pkcs8_der(&sensitive.material)
                .map_err(|_| ResponseCode::Binding)?;
            Ok(Unique::Rsa {
                modulus: key.n().to_bytes_be(),
            })
        }
        KeyParams::SymCipher(_) => Ok(Unique::SymCipher {
            digest: obfuscated_digest(template.name_alg, sensitive)?,
        }),
        KeyParams::KeyedHash(_) => Ok(Unique::KeyedHash {
            digest: obfuscated_digest(template.name_alg, sensitive)?,
        }),
    }
}

fn obfuscated_digest(name_alg: HashAlg, sensitive: &Sensitive) -> Result<Vec<u8>, ResponseCode> {
    name_alg
        .digest_parts(&[sensitive.seed.as_slice(), sensitive.material.as_slice()])
        .map_err(|_| ResponseCode::Hash)
}

/// Encrypts and integrity-protects a child's secrets under a storage parent.
///
/// Layout: sized HMAC-SHA256 over (ciphertext ‖ child name), then the
/// AES-CFB ciphertext of the marshaled sensitive area.
pub(super) fn wrap(
    parent: &Object,
    child_name: &Name,
    sensitive: &Sensitive,
) -> Result<PrivateBlob, ResponseCode> {
    let (storage_key, integrity_key) = protection_keys(parent, child_name)?;

    let mut encrypted = sensitive.marshal().to_vec();
    crypto::aes_cfb(&storage_key, &[0u8; 16], &mut encrypted, false)?;
    let tag = crypto::hmac(
        HashAlg::Sha256,
        &integrity_key[..],
        &[encrypted.as_slice(), child_name.as_bytes()],
    )?;

    let mut w = Writer::new();
    w.sized(&tag);
    w.bytes(&encrypted);
    PrivateBlob::new(w.into_bytes()).map_err(|_| ResponseCode::Size)
}

/// Reverses [`wrap`], failing with `Integrity` before any decryption when the
/// blob was altered or belongs to another parent or public area.
pub(super) fn unwrap(
    parent: &Object,
    public: &PublicArea,
    child_name: &Name,
    private: &PrivateBlob,
) -> Result<Sensitive, ResponseCode> {
    let (storage_key, integrity_key) = protection_keys(parent, child_name)?;

    let mut r = Reader::new(private.as_bytes());
    let tag = r.sized().map_err(|_| ResponseCode::Integrity)?;
    let encrypted = r.rest();
    let intact = crypto::hmac_matches(
        HashAlg::Sha256,
        &integrity_key[..],
        &[encrypted, child_name.as_bytes()],
        tag,
    )?;
    if !intact {
        return Err(ResponseCode::Integrity);
    }

    let mut plain = Zeroizing::new(encrypted.to_vec());
    crypto::aes_cfb(&storage_key, &[0u8; 16], &mut plain, true)?;
    let sensitive = Sensitive::unmarshal(&plain).map_err(|_| ResponseCode::Integrity)?;

    if &unique_for(public.template(), &sensitive)? != public.unique() {
        return Err(ResponseCode::Binding);
    }
    Ok(sensitive)
}

fn protection_keys(
    parent: &Object,
    child_name: &Name,
) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<[u8; 32]>), ResponseCode> {
    let def = parent
        .public
        .params()
        .symmetric()
        .ok_or(ResponseCode::Type)?;
    let mut storage_key = Zeroizing::new(vec![0u8; def.key_bytes()]);
    crypto::kdf(
        &parent.sensitive.seed,
        STORAGE_LABEL,
        &[child_name.as_bytes()],
        &mut storage_key,
    )?;
    let mut integrity_key = Zeroizing::new([0u8; 32]);
    crypto::kdf(
        &parent.sensitive.seed,
        INTEGRITY_LABEL,
        &[],
        &mut integrity_key[..],
    )?;
    Ok((storage_key, integrity_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog;
    use rand::rngs::OsRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn storage_parent() -> Object {
        let template = catalog::ecc_storage_parent();
        let (public, sensitive) =
            generate(&template, &SensitiveCreate::default(), &mut OsRng).unwrap();
        Object {
            name: Name::compute(&public).unwrap(),
            public,
            sensitive,
            hierarchy: Hierarchy::Owner,
        }
    }

    #[test]
    fn test_generation_is_deterministic_for_a_fixed_rng() {
        let template = catalog::ecc_signer();
        let (a, _) = generate(
            &template,
            &SensitiveCreate::default(),
            &mut ChaCha20Rng::from_seed([4; 32]),
        )
        .unwrap();
        let (b, _) = generate(
            &template,
            &SensitiveCreate::default(),
            &mut ChaCha20Rng::from_seed([4; 32]),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sealed_data_is_kept_verbatim() {
        let template = catalog::sealed_data(HashAlg::Sha256).unwrap();
        let (_, secrets) = generate(
            &template,
            &SensitiveCreate::with_data(b"top secret".to_vec()),
            &mut OsRng,
        )
        .unwrap();
        assert_eq!(secrets.material, b"top secret");
    }

    #[test]
    fn test_wrap_unwrap() {
        let parent = storage_parent();
        let (public, secrets) =
            generate(&catalog::aes128_cfb(), &SensitiveCreate::default(), &mut OsRng).unwrap();
        let name = Name::compute(&public).unwrap();

        let private = wrap(&parent, &name, &secrets).unwrap();
        let restored = unwrap(&parent, &public, &name, &private).unwrap();
        assert_eq!(restored.material, secrets.material);
    }

    #[test]
    fn test_unwrap_under_other_parent_fails_integrity() {
        let parent = storage_parent();
        let other = storage_parent();
        let (public, secrets) =
            generate(&catalog::aes128_cfb(), &SensitiveCreate::default(), &mut OsRng).unwrap();
        let name = Name::compute(&public).unwrap();
        let private = wrap(&parent, &name, &secrets).unwrap();

        assert_eq!(
            unwrap(&other, &public, &name, &private).err(),
            Some(ResponseCode::Integrity)
        );
    }

    #[test]
    fn test_flipped_ciphertext_bit_fails_integrity() {
        let parent = storage_parent();
        let (public, secrets) =
            generate(&catalog::aes128_cfb(), &SensitiveCreate::default(), &mut OsRng).unwrap();
        let name = Name::compute(&public).unwrap();
        let mut bytes = wrap(&parent, &name, &secrets).unwrap().as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = PrivateBlob::new(bytes).unwrap();

        assert_eq!(
            unwrap(&parent, &public, &name, &tampered).err(),
            Some(ResponseCode::Integrity)
        );
    }
}
