//! Encryption, decryption and sealing workflows

use std::path::Path;

use tracing::info;

use super::{storage_parent, KEY_HIERARCHY};
use crate::codec::EncryptedBlob;
use crate::dispatch::SYM_IV_SIZE;
use crate::error::{TpmKeysError, TpmKeysResult};
use crate::export::PublicKey;
use crate::files;
use crate::model::{AuthValue, HashAlg, KeyBlob};
use crate::ports::ModuleOpener;
use crate::session::with_session;

/// RSA-OAEP encryption on the host against a PEM public key.
pub fn encrypt(public_key_file: &Path, plaintext: &[u8]) -> TpmKeysResult<Vec<u8>> {
    let pem = files::read_input(public_key_file)?;
    let pem = String::from_utf8(pem).map_err(|_| TpmKeysError::KeyFormat {
        reason: "public key file is not PEM text".to_string(),
    })?;
    PublicKey::from_pem(&pem)?.encrypt_oaep(plaintext)
}

/// RSA-OAEP decryption by the module with the key in `key_file`.
pub fn decrypt<O: ModuleOpener>(
    opener: &O,
    key_file: &Path,
    auth: AuthValue,
    ciphertext: &[u8],
) -> TpmKeysResult<Vec<u8>> {
    let blob = KeyBlob::read_file(key_file)?;
    with_session(opener, |session| {
        let key = session
            .load_under_primary(KEY_HIERARCHY, &storage_parent(), &blob)?
            .with_auth(auth);
        session.rsa_decrypt(&key, ciphertext)
    })
}

/// Encrypts `plaintext` with a symmetric key file under a module-generated
/// IV and writes ciphertext and IV together to `output`.
pub fn sym_encrypt<O: ModuleOpener>(
    opener: &O,
    key_file: &Path,
    auth: AuthValue,
    plaintext: &[u8],
    output: &Path,
) -> TpmKeysResult<EncryptedBlob> {
    let blob = KeyBlob::read_file(key_file)?;
    let encrypted = with_session(opener, |session| {
        let iv = session.random(SYM_IV_SIZE)?;
        let key = session
            .load_under_primary(KEY_HIERARCHY, &storage_parent(), &blob)?
            .with_auth(auth);
        let ciphertext = session.encrypt(&key, &iv, plaintext)?;
        Ok(EncryptedBlob { ciphertext, iv })
    })?;
    files::write_public(output, encrypted.to_json()?.as_bytes())?;
    info!(path = %output.display(), "encrypted blob written");
    Ok(encrypted)
}

/// Reverses [`sym_encrypt`], reading the ciphertext and IV from `input`.
pub fn sym_decrypt<O: ModuleOpener>(
    opener: &O,
    key_file: &Path,
    auth: AuthValue,
    input: &Path,
) -> TpmKeysResult<Vec<u8>> {
    let encrypted = EncryptedBlob::from_json(&files::read_input(input)?)?;
    let blob = KeyBlob::read_file(key_file)?;
    with_session(opener, |session| {
        let key = session
            .load_under_primary(KEY_HIERARCHY, &storage_parent(), &blob)?
            .with_auth(auth);
        session.decrypt(&key, &encrypted.iv, &encrypted.ciphertext)
    })
}

/// Seals `payload` under the owner storage parent into `sealed_file`.
pub fn seal_data<O: ModuleOpener>(
    opener: &O,
    payload: &[u8],
    name_alg: HashAlg,
    sealed_file: &Path,
) -> TpmKeysResult<()> {
    let blob = with_session(opener, |session| {
        let parent = session.create_primary(KEY_HIERARCHY, &storage_parent())?;
        session.seal(&parent, payload, name_alg)
    })?;
    blob.write_file(sealed_file)?;
    info!(path = %sealed_file.display(), "sealed object written");
    Ok(())
}

pub fn unseal_data<O: ModuleOpener>(opener: &O, sealed_file: &Path) -> TpmKeysResult<Vec<u8>> {
    let blob = KeyBlob::read_file(sealed_file)?;
    with_session(opener, |session| {
        let item = session.load_under_primary(KEY_HIERARCHY, &storage_parent(), &blob)?;
        session.unseal(&item)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftwareModule;
    use crate::model::KeyKind;
    use crate::use_cases::{create_key, export_public_key};

    #[test]
    fn test_encrypt_then_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.tpm");
        let pem_file = dir.path().join("public.pem");
        let module = SoftwareModule::in_memory();
        create_key(&module, KeyKind::Decrypt, AuthValue::empty(), &key_file).unwrap();
        export_public_key(&key_file, &pem_file).unwrap();

        let ciphertext = encrypt(&pem_file, b"Hello!").unwrap();
        assert_eq!(
            decrypt(&module, &key_file, AuthValue::empty(), &ciphertext).unwrap(),
            b"Hello!"
        );
    }

    #[test]
    fn test_sym_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.tpm");
        let blob_file = dir.path().join("blob.enc");
        let module = SoftwareModule::in_memory();
        create_key(&module, KeyKind::Symmetric, AuthValue::empty(), &key_file).unwrap();

        let encrypted =
            sym_encrypt(&module, &key_file, AuthValue::empty(), b"payload", &blob_file).unwrap();
        assert_eq!(encrypted.iv.len(), SYM_IV_SIZE);
        assert_eq!(
            sym_decrypt(&module, &key_file, AuthValue::empty(), &blob_file).unwrap(),
            b"payload"
        );
    }

    #[test]
    fn test_seal_then_unseal() {
        let dir = tempfile::tempdir().unwrap();
        let sealed_file = dir.path().join("sealed_key.tpm");
        let module = SoftwareModule::in_memory();

        seal_data(&module, b"disk key", HashAlg::Sha384, &sealed_file).unwrap();
        assert_eq!(unseal_data(&module, &sealed_file).unwrap(), b"disk key");
    }

    #[test]
    fn test_unseal_of_signing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.tpm");
        let module = SoftwareModule::in_memory();
        create_key(&module, KeyKind::Signer, AuthValue::empty(), &key_file).unwrap();

        assert!(matches!(
            unseal_data(&module, &key_file),
            Err(TpmKeysError::NotSealable { .. })
        ));
    }
}
