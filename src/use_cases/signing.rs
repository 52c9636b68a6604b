use std::path::Path;

use tracing::info;

use super::{storage_parent, KEY_HIERARCHY};
use crate::error::{TpmKeysError, TpmKeysResult};
use crate::export::PublicKey;
use crate::files;
use crate::model::{AuthValue, KeyBlob};
use crate::ports::ModuleOpener;
use crate::session::with_session;

/// Signs `message` with the key in `key_file` and writes the DER signature
/// to `signature_file`.
///
/// Restricted keys go through the module's hash-and-ticket path, so the
/// message must fit one module hash buffer.
pub fn sign_message<O: ModuleOpener>(
    opener: &O,
    key_file: &Path,
    auth: AuthValue,
    message: &[u8],
    signature_file: &Path,
) -> TpmKeysResult<Vec<u8>> {
    let blob = KeyBlob::read_file(key_file)?;
    let signature = with_session(opener, |session| {
        let key = session
            .load_under_primary(KEY_HIERARCHY, &storage_parent(), &blob)?
            .with_auth(auth);
        session.sign(&key, message)
    })?;
    let der = signature.to_der()?;
    files::write_public(signature_file, &der)?;
    info!(path = %signature_file.display(), "signature written");
    Ok(der)
}

/// Verifies a signature file against a PEM public key, entirely on the host.
///
/// # Errors
///
/// [`TpmKeysError::KeyFormat`] for an unreadable key or signature. A
/// signature that simply does not match is `Ok(false)`.
pub fn verify_signature(
    public_key_file: &Path,
    message: &[u8],
    signature_file: &Path,
) -> TpmKeysResult<bool> {
    let pem = files::read_input(public_key_file)?;
    let pem = std::str::from_utf8(&pem).map_err(|_| TpmKeysError::KeyFormat {
        reason: "public key file is not PEM text".to_string(),
    })?;
    let signature = files::read_input(signature_file)?;
    PublicKey::from_pem(pem)?.verify(message, &signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftwareModule;
    use crate::model::KeyKind;
    use crate::use_cases::{create_key, export_public_key};

    #[test]
    fn test_sign_and_verify_files() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.tpm");
        let pem_file = dir.path().join("public.pem");
        let sig_file = dir.path().join("message.sig");
        let module = SoftwareModule::in_memory();

        for kind in [KeyKind::Signer, KeyKind::RestrictedSigner, KeyKind::Decrypt] {
            create_key(&module, kind, AuthValue::empty(), &key_file).unwrap();
            export_public_key(&key_file, &pem_file).unwrap();

            sign_message(&module, &key_file, AuthValue::empty(), b"test message", &sig_file)
                .unwrap();
            assert!(verify_signature(&pem_file, b"test message", &sig_file).unwrap());
            assert!(!verify_signature(&pem_file, b"tampered", &sig_file).unwrap());
        }
    }

    #[test]
    fn test_wrong_password() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.tpm");
        let module = SoftwareModule::in_memory();
        let auth = AuthValue::from_str("secret").unwrap();
        create_key(&module, KeyKind::Signer, auth, &key_file).unwrap();

        assert!(matches!(
            sign_message(
                &module,
                &key_file,
                AuthValue::from_str("guess").unwrap(),
                b"m",
                &dir.path().join("message.sig"),
            ),
            Err(TpmKeysError::AuthorizationDenied { .. })
        ));
    }
}
