use super::{CodecError, Reader, Writer};
use crate::model::{
    alg_id, EccCurve, EccParams, EccScheme, HashAlg, KeyParams, KeyTemplate, KeyedHashParams,
    KeyedHashScheme, ObjectAttributes, PublicArea, RsaParams, RsaScheme, SymDef, SymMode,
    TemplateError, Unique,
};

/// Marshals a public area in the module's canonical layout.
///
/// The output is the input to name computation, so it must be bit-exact.
pub fn marshal_public(public: &PublicArea) -> Vec<u8> {
    let mut w = Writer::new();
    write_public(&mut w, public);
    w.into_bytes()
}

/// Parses exactly one public area, rejecting trailing bytes.
pub fn unmarshal_public(bytes: &[u8]) -> Result<PublicArea, CodecError> {
    let mut r = Reader::new(bytes);
    let public = read_public(&mut r)?;
    r.finish()?;
    Ok(public)
}

pub(crate) fn write_public(w: &mut Writer, public: &PublicArea) {
    let type_id = match public.params() {
        KeyParams::Rsa(_) => alg_id::RSA,
        KeyParams::Ecc(_) => alg_id::ECC,
        KeyParams::SymCipher(_) => alg_id::SYMCIPHER,
        KeyParams::KeyedHash(_) => alg_id::KEYEDHASH,
    };
    w.u16(type_id);
    w.u16(public.name_alg().id());
    w.u32(public.attributes().bits());
    w.sized(public.auth_policy());

    match public.params() {
        KeyParams::Rsa(p) => {
            write_sym_def(w, p.symmetric);
            match p.scheme {
                None => w.u16(alg_id::NULL),
                Some(RsaScheme::RsaSsa(hash)) => {
                    w.u16(alg_id::RSASSA);
                    w.u16(hash.id());
                }
                Some(RsaScheme::Oaep(hash)) => {
                    w.u16(alg_id::OAEP);
                    w.u16(hash.id());
                }
            }
            w.u16(p.key_bits);
            w.u32(p.exponent);
        }
        KeyParams::Ecc(p) => {
            write_sym_def(w, p.symmetric);
            match p.scheme {
                None => w.u16(alg_id::NULL),
                Some(EccScheme::Ecdsa(hash)) => {
                    w.u16(alg_id::ECDSA);
                    w.u16(hash.id());
                }
            }
            w.u16(p.curve.id());
            w.u16(alg_id::NULL);
        }
        KeyParams::SymCipher(def) => write_sym_def(w, Some(*def)),
        KeyParams::KeyedHash(p) => match p.scheme {
            None => w.u16(alg_id::NULL),
            Some(KeyedHashScheme::Hmac(hash)) => {
                w.u16(alg_id::HMAC);
                w.u16(hash.id());
            }
        },
    }

    match public.unique() {
        Unique::Rsa { modulus } => w.sized(modulus),
        Unique::Ecc { x, y } => {
            w.sized(x);
            w.sized(y);
        }
        Unique::SymCipher { digest } | Unique::KeyedHash { digest } => w.sized(digest),
    }
}

fn write_sym_def(w: &mut Writer, def: Option<SymDef>) {
    match def {
        None => w.u16(alg_id::NULL),
        Some(def) => {
            w.u16(alg_id::AES);
            w.u16(def.key_bits);
            w.u16(def.mode.id());
        }
    }
}

pub(crate) fn read_public(r: &mut Reader<'_>) -> Result<PublicArea, CodecError> {
    let type_id = r.u16()?;
    let name_alg = read_hash(r, "name algorithm")?;
    let bits = r.u32()?;
    let attributes = ObjectAttributes::from_bits(bits).ok_or(CodecError::UnknownValue {
        field: "object attributes",
        value: bits,
    })?;
    let auth_policy = r.sized()?.to_vec();

    let params = match type_id {
        alg_id::RSA => {
            let symmetric = read_sym_def(r)?;
            let scheme = match r.u16()? {
                alg_id::NULL => None,
                alg_id::RSASSA => Some(RsaScheme::RsaSsa(read_hash(r, "RSA scheme hash")?)),
                alg_id::OAEP => Some(RsaScheme::Oaep(read_hash(r, "RSA scheme hash")?)),
                other => return Err(unknown("RSA scheme", other)),
            };
            let key_bits = r.u16()?;
            let exponent = r.u32()?;
            KeyParams::Rsa(RsaParams {
                symmetric,
                scheme,
                key_bits,
                exponent,
            })
        }
        alg_id::ECC => {
            let symmetric = read_sym_def(r)?;
            let scheme = match r.u16()? {
                alg_id::NULL => None,
                alg_id::ECDSA => Some(EccScheme::Ecdsa(read_hash(r, "ECC scheme hash")?)),
                other => return Err(unknown("ECC scheme", other)),
            };
            let curve_id = r.u16()?;
            let curve = EccCurve::from_id(curve_id).map_err(|_| unknown("ECC curve", curve_id))?;
            let kdf = r.u16()?;
            if kdf != alg_id::NULL {
                return Err(unknown("ECC KDF", kdf));
            }
            KeyParams::Ecc(EccParams {
                symmetric,
                scheme,
                curve,
            })
        }
        alg_id::SYMCIPHER => match read_sym_def(r)? {
            Some(def) => KeyParams::SymCipher(def),
            None => {
                return Err(CodecError::Invalid {
                    field: "symmetric cipher parameters",
                    reason: "algorithm is null".to_string(),
                })
            }
        },
        alg_id::KEYEDHASH => {
            let scheme = match r.u16()? {
                alg_id::NULL => None,
                alg_id::HMAC => Some(KeyedHashScheme::Hmac(read_hash(r, "HMAC hash")?)),
                other => return Err(unknown("keyed-hash scheme", other)),
            };
            KeyParams::KeyedHash(KeyedHashParams { scheme })
        }
        other => return Err(unknown("object type", other)),
    };

    let unique = match params {
        KeyParams::Rsa(_) => Unique::Rsa {
            modulus: r.sized()?.to_vec(),
        },
        KeyParams::Ecc(_) => Unique::Ecc {
            x: r.sized()?.to_vec(),
            y: r.sized()?.to_vec(),
        },
        KeyParams::SymCipher(_) => Unique::SymCipher {
            digest: r.sized()?.to_vec(),
        },
        KeyParams::KeyedHash(_) => Unique::KeyedHash {
            digest: r.sized()?.to_vec(),
        },
    };

    let template = KeyTemplate {
        name_alg,
        attributes,
        auth_policy,
        params,
    };
    PublicArea::new(template, unique).map_err(|e: TemplateError| CodecError::Invalid {
        field: "public area",
        reason: e.to_string(),
    })
}

fn read_sym_def(r: &mut Reader<'_>) -> Result<Option<SymDef>, CodecError> {
    match r.u16()? {
        alg_id::NULL => Ok(None),
        alg_id::AES => {
            let key_bits = r.u16()?;
            let mode_id = r.u16()?;
            let mode = SymMode::from_id(mode_id).map_err(|_| unknown("symmetric mode", mode_id))?;
            Ok(Some(SymDef { key_bits, mode }))
        }
        other => Err(unknown("symmetric algorithm", other)),
    }
}

fn read_hash(r: &mut Reader<'_>, field: &'static str) -> Result<HashAlg, CodecError> {
    let id = r.u16()?;
    HashAlg::from_id(id).map_err(|_| unknown(field, id))
}

fn unknown(field: &'static str, value: u16) -> CodecError {
    CodecError::UnknownValue {
        field,
        value: value as u32,
    }
}
