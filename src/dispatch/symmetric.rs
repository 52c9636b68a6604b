use super::not_permitted;
use crate::error::{TpmKeysError, TpmKeysResult};
use crate::model::{KeyParams, SymMode};
use crate::ports::{Command, Operation, Response, Transport, MAX_BUFFER};
use crate::session::{unexpected, ObjectRef, Session};

/// IV length for the module's AES keys
pub const SYM_IV_SIZE: usize = 16;

impl<T: Transport> Session<T> {
    /// Encrypts `data` under a symmetric key in the key's own mode.
    ///
    /// Input longer than one module buffer is sent in chunks, each chunk
    /// continuing from the IV the previous one returned.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::InvalidIv`] unless `iv` is [`SYM_IV_SIZE`] bytes.
    pub fn encrypt(&self, key: &impl ObjectRef, iv: &[u8], data: &[u8]) -> TpmKeysResult<Vec<u8>> {
        self.encrypt_decrypt(key, false, iv, data)
    }

    /// Inverse of [`Session::encrypt`]. A wrong IV yields wrong plaintext, not an error.
    pub fn decrypt(&self, key: &impl ObjectRef, iv: &[u8], data: &[u8]) -> TpmKeysResult<Vec<u8>> {
        self.encrypt_decrypt(key, true, iv, data)
    }

    fn encrypt_decrypt(
        &self,
        key: &impl ObjectRef,
        decrypt: bool,
        iv: &[u8],
        data: &[u8],
    ) -> TpmKeysResult<Vec<u8>> {
        let mode = symmetric_mode(key)?;
        if iv.len() != SYM_IV_SIZE {
            return Err(TpmKeysError::InvalidIv {
                expected: SYM_IV_SIZE,
                actual: iv.len(),
            });
        }

        let mut output = Vec::with_capacity(data.len());
        let mut iv = iv.to_vec();
        for chunk in data.chunks(MAX_BUFFER) {
            let response = self.run(
                Command::EncryptDecrypt {
                    key: key.auth_handle(),
                    decrypt,
                    mode,
                    iv,
                    data: chunk.to_vec(),
                },
                key.handle(),
            )?;
            let Response::EncryptDecrypt { data, iv_out } = response else {
                return Err(unexpected(Operation::EncryptDecrypt));
            };
            output.extend_from_slice(&data);
            iv = iv_out;
        }
        Ok(output)
    }
}

fn symmetric_mode(key: &impl ObjectRef) -> TpmKeysResult<SymMode> {
    match key.public().params() {
        KeyParams::SymCipher(def) => Ok(def.mode),
        _ => Err(not_permitted(
            Operation::EncryptDecrypt,
            key,
            &format!(
                "{} objects cannot run a block cipher",
                key.public().object_type()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::recording::RecordingTransport;
    use crate::adapters::SoftwareModule;
    use crate::model::{catalog, Hierarchy};

    const IV: [u8; SYM_IV_SIZE] = [7; SYM_IV_SIZE];

    #[test]
    fn test_round_trip() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        let key = session
            .create_primary(Hierarchy::Owner, &catalog::aes128_cfb())
            .unwrap();

        let ciphertext = session.encrypt(&key, &IV, b"attack at dawn").unwrap();
        assert_eq!(ciphertext.len(), 14);
        assert_ne!(ciphertext, b"attack at dawn");
        assert_eq!(session.decrypt(&key, &IV, &ciphertext).unwrap(), b"attack at dawn");
    }

    #[test]
    fn test_wrong_iv_gives_wrong_plaintext() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        let key = session
            .create_primary(Hierarchy::Owner, &catalog::aes128_cfb())
            .unwrap();

        let ciphertext = session.encrypt(&key, &IV, b"attack at dawn").unwrap();
        let plaintext = session.decrypt(&key, &[0; SYM_IV_SIZE], &ciphertext).unwrap();
        assert_ne!(plaintext, b"attack at dawn");
    }

    #[test]
    fn test_long_input_is_chunked_and_chained() {
        let transport = RecordingTransport::new(SoftwareModule::in_memory().connect());
        let log = transport.log();
        let session = Session::new(transport);
        let key = session
            .create_primary(Hierarchy::Owner, &catalog::aes128_cfb())
            .unwrap();
        let data: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();

        let ciphertext = session.encrypt(&key, &IV, &data).unwrap();
        let calls = log
            .borrow()
            .iter()
            .filter(|op| **op == Operation::EncryptDecrypt)
            .count();
        assert_eq!(calls, 3);

        // CFB output for a prefix does not depend on what follows it.
        let first = session.encrypt(&key, &IV, &data[..MAX_BUFFER]).unwrap();
        assert_eq!(&ciphertext[..MAX_BUFFER], &first[..]);
        assert_eq!(session.decrypt(&key, &IV, &ciphertext).unwrap(), data);
    }

    #[test]
    fn test_iv_length_is_checked() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        let key = session
            .create_primary(Hierarchy::Owner, &catalog::aes128_cfb())
            .unwrap();
        assert!(matches!(
            session.encrypt(&key, &[0; 8], b"x"),
            Err(TpmKeysError::InvalidIv {
                expected: 16,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_asymmetric_key_is_refused() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        let key = session
            .create_primary(Hierarchy::Owner, &catalog::ecc_signer())
            .unwrap();
        assert!(matches!(
            session.encrypt(&key, &IV, b"x"),
            Err(TpmKeysError::AuthorizationDenied { .. })
        ));
    }
}
