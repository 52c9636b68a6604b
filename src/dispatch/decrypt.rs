use super::not_permitted;
use crate::error::{TpmKeysError, TpmKeysResult};
use crate::model::{HashAlg, KeyParams};
use crate::ports::{Command, ModuleFault, Operation, Response, ResponseCode, Transport};
use crate::session::{unexpected, ObjectRef, Session};

/// OAEP digest for RSA decryption, matching the exported public key's use
pub const OAEP_HASH: HashAlg = HashAlg::Sha256;

impl<T: Transport> Session<T> {
    /// Decrypts an RSA-OAEP ciphertext with `key`.
    ///
    /// # Errors
    ///
    /// Every padding or length problem is the same
    /// [`TpmKeysError::DecryptionFailed`], whatever the module reported.
    pub fn rsa_decrypt(&self, key: &impl ObjectRef, ciphertext: &[u8]) -> TpmKeysResult<Vec<u8>> {
        let public = key.public();
        if !matches!(public.params(), KeyParams::Rsa(_)) {
            return Err(not_permitted(
                Operation::RsaDecrypt,
                key,
                &format!("{} objects cannot decrypt RSA ciphertext", public.object_type()),
            ));
        }
        if !public.attributes().can_decrypt() || public.is_restricted() {
            return Err(not_permitted(
                Operation::RsaDecrypt,
                key,
                "object attributes do not permit decryption",
            ));
        }

        let response = self
            .execute(Command::RsaDecrypt {
                key: key.auth_handle(),
                ciphertext: ciphertext.to_vec(),
                oaep_hash: OAEP_HASH,
            })
            .map_err(|fault| match fault {
                ModuleFault::Rejected(ResponseCode::Value | ResponseCode::Size) => {
                    TpmKeysError::DecryptionFailed
                }
                other => TpmKeysError::from_fault(Operation::RsaDecrypt, key.handle(), other),
            })?;
        match response {
            Response::RsaDecrypt { message } => Ok(message),
            _ => Err(unexpected(Operation::RsaDecrypt)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftwareModule;
    use crate::export::PublicKey;
    use crate::model::{catalog, Hierarchy};

    #[test]
    fn test_oaep_round_trip() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        let key = session
            .create_primary(Hierarchy::Owner, &catalog::rsa_decrypt())
            .unwrap();
        let ciphertext = PublicKey::from_public_area(key.public())
            .unwrap()
            .encrypt_oaep(b"Hello!")
            .unwrap();

        assert_eq!(session.rsa_decrypt(&key, &ciphertext).unwrap(), b"Hello!");
    }

    #[test]
    fn test_bad_ciphertexts_fail_alike() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        let key = session
            .create_primary(Hierarchy::Owner, &catalog::rsa_decrypt())
            .unwrap();

        let short = session.rsa_decrypt(&key, &[1, 2, 3]).unwrap_err();
        let garbage = session.rsa_decrypt(&key, &[0x5A; 256]).unwrap_err();
        assert!(matches!(short, TpmKeysError::DecryptionFailed));
        assert_eq!(short.to_string(), garbage.to_string());
    }

    #[test]
    fn test_storage_parent_cannot_decrypt() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        let key = session
            .create_primary(Hierarchy::Owner, &catalog::rsa_storage_parent())
            .unwrap();
        assert!(matches!(
            session.rsa_decrypt(&key, &[0; 256]),
            Err(TpmKeysError::AuthorizationDenied { .. })
        ));
    }
}
