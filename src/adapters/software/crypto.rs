//! Primitive operations behind the software module's commands

use aes::{Aes128, Aes256};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::model::HashAlg;
use crate::ports::ResponseCode;

/// HKDF-SHA256 of `secret` under `label`, with `context` as the info parts.
pub(super) fn kdf(
    secret: &[u8],
    label: &[u8],
    context: &[&[u8]],
    out: &mut [u8],
) -> Result<(), ResponseCode> {
    Hkdf::<Sha256>::new(Some(label), secret)
        .expand_multi_info(context, out)
        .map_err(|_| ResponseCode::Size)
}

macro_rules! hmac_parts {
    ($digest:ty, $key:expr, $parts:expr) => {{
        let mut mac =
            <Hmac<$digest> as Mac>::new_from_slice($key).map_err(|_| ResponseCode::Size)?;
        for part in $parts {
            mac.update(part);
        }
        mac.finalize().into_bytes().to_vec()
    }};
}

pub(super) fn hmac(hash: HashAlg, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, ResponseCode> {
    Ok(match hash {
        HashAlg::Sha1 => hmac_parts!(Sha1, key, parts),
        HashAlg::Sha256 => hmac_parts!(Sha256, key, parts),
        HashAlg::Sha384 => hmac_parts!(Sha384, key, parts),
        HashAlg::Sha512 => hmac_parts!(Sha512, key, parts),
        HashAlg::Sm3_256 => return Err(ResponseCode::Hash),
    })
}

/// Constant-time comparison of an expected HMAC against `tag`
pub(super) fn hmac_matches(
    hash: HashAlg,
    key: &[u8],
    parts: &[&[u8]],
    tag: &[u8],
) -> Result<bool, ResponseCode> {
    let expected = hmac(hash, key, parts)?;
    Ok(expected.as_slice().ct_eq(tag).into())
}

macro_rules! cfb_apply {
    ($cipher:ty, $key:expr, $iv:expr, $data:expr, $decrypt:expr) => {{
        if $decrypt {
            cfb_mode::Decryptor::<$cipher>::new_from_slices($key, $iv)
                .map_err(|_| ResponseCode::Size)?
                .decrypt($data);
        } else {
            cfb_mode::Encryptor::<$cipher>::new_from_slices($key, $iv)
                .map_err(|_| ResponseCode::Size)?
                .encrypt($data);
        }
    }};
}

/// AES in CFB mode, in place. The key length selects AES-128 or AES-256.
pub(super) fn aes_cfb(
    key: &[u8],
    iv: &[u8],
    data: &mut [u8],
    decrypt: bool,
) -> Result<(), ResponseCode> {
    match key.len() {
        16 => cfb_apply!(Aes128, key, iv, data, decrypt),
        32 => cfb_apply!(Aes256, key, iv, data, decrypt),
        _ => return Err(ResponseCode::KeySize),
    }
    Ok(())
}

/// ECDSA over a precomputed digest; returns `(r, s)`.
pub(super) fn ecdsa_sign(scalar: &[u8], digest: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ResponseCode> {
    let key = SigningKey::from_slice(scalar).map_err(|_| ResponseCode::Value)?;
    let signature: EcdsaSignature = key.sign_prehash(digest).map_err(|_| ResponseCode::Value)?;
    let (r, s) = signature.split_bytes();
    Ok((r.to_vec(), s.to_vec()))
}

/// RSASSA-PKCS1-v1_5 over a precomputed digest
pub(super) fn rsa_sign(der: &[u8], hash: HashAlg, digest: &[u8]) -> Result<Vec<u8>, ResponseCode> {
    let key = RsaPrivateKey::from_pkcs8_der(der).map_err(|_| ResponseCode::Value)?;
    let padding = match hash {
        HashAlg::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlg::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlg::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlg::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        HashAlg::Sm3_256 => return Err(ResponseCode::Hash),
    };
    key.sign(padding, digest).map_err(|_| ResponseCode::Value)
}

/// RSA-OAEP decryption. Every failure is the same [`ResponseCode::Value`].
pub(super) fn rsa_oaep_decrypt(
    der: &[u8],
    hash: HashAlg,
    ciphertext: &[u8],
) -> Result<Vec<u8>, ResponseCode> {
    let key = RsaPrivateKey::from_pkcs8_der(der).map_err(|_| ResponseCode::Value)?;
    let padding = match hash {
        HashAlg::Sha1 => Oaep::new::<Sha1>(),
        HashAlg::Sha256 => Oaep::new::<Sha256>(),
        HashAlg::Sha384 => Oaep::new::<Sha384>(),
        HashAlg::Sha512 => Oaep::new::<Sha512>(),
        HashAlg::Sm3_256 => return Err(ResponseCode::Hash),
    };
    key.decrypt(padding, ciphertext)
        .map_err(|_| ResponseCode::Value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kdf_is_deterministic_and_label_separated() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        let mut c = [0u8; 32];
        kdf(b"seed", b"STORAGE", &[&b"ctx"[..]], &mut a).unwrap();
        kdf(b"seed", b"STORAGE", &[&b"ctx"[..]], &mut b).unwrap();
        kdf(b"seed", b"INTEGRITY", &[&b"ctx"[..]], &mut c).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hmac_rfc4231_case_2() {
        let tag = hmac(
            HashAlg::Sha256,
            b"Jefe",
            &[&b"what do ya want "[..], &b"for nothing?"[..]],
        )
        .unwrap();
        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_matches_rejects_other_tag() {
        let tag = hmac(HashAlg::Sha384, b"k", &[&b"m"[..]]).unwrap();
        assert!(hmac_matches(HashAlg::Sha384, b"k", &[&b"m"[..]], &tag).unwrap());
        assert!(!hmac_matches(HashAlg::Sha384, b"k", &[&b"n"[..]], &tag).unwrap());
        assert!(!hmac_matches(HashAlg::Sha384, b"k", &[&b"m"[..]], &tag[1..]).unwrap());
    }

    #[test]
    fn test_aes_cfb_round_trip() {
        let key = [7u8; 16];
        let iv = [9u8; 16];
        let mut data = b"stream cipher, no padding".to_vec();
        aes_cfb(&key, &iv, &mut data, false).unwrap();
        assert_ne!(data.as_slice(), b"stream cipher, no padding");
        aes_cfb(&key, &iv, &mut data, true).unwrap();
        assert_eq!(data.as_slice(), b"stream cipher, no padding");
    }

    #[test]
    fn test_aes_cfb_rejects_bad_lengths() {
        let mut data = [0u8; 4];
        assert_eq!(
            aes_cfb(&[0u8; 24], &[0u8; 16], &mut data, false),
            Err(ResponseCode::KeySize)
        );
        assert_eq!(
            aes_cfb(&[0u8; 16], &[0u8; 8], &mut data, false),
            Err(ResponseCode::Size)
        );
    }
}
