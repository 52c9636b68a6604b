use tracing::debug;

use crate::error::{TpmKeysError, TpmKeysResult};
use crate::model::{catalog, HashAlg, Hierarchy};
use crate::ports::{Command, Operation, Response, Transport, MAX_BUFFER};
use crate::session::{unexpected, ObjectRef, Session};

impl<T: Transport> Session<T> {
    /// HMAC of `data` under the hierarchy's primary HMAC key for `hash`.
    ///
    /// The key is derived for the call and flushed afterwards, so the tag is
    /// stable for as long as the hierarchy seed is.
    pub fn hmac(&self, hierarchy: Hierarchy, hash: HashAlg, data: &[u8]) -> TpmKeysResult<Vec<u8>> {
        check_length(data)?;
        let key = self.create_primary(hierarchy, &catalog::hmac_key(hash)?)?;
        let tag = self.hmac_with(&key, data)?;
        key.release()?;
        debug!(%hierarchy, %hash, "hmac computed");
        Ok(tag)
    }

    /// HMAC of `data` under a loaded keyed-hash key
    pub fn hmac_with(&self, key: &impl ObjectRef, data: &[u8]) -> TpmKeysResult<Vec<u8>> {
        check_length(data)?;
        let response = self.run(
            Command::Hmac {
                key: key.auth_handle(),
                data: data.to_vec(),
            },
            key.handle(),
        )?;
        match response {
            Response::Hmac { tag } => Ok(tag),
            _ => Err(unexpected(Operation::Hmac)),
        }
    }
}

fn check_length(data: &[u8]) -> TpmKeysResult<()> {
    if data.len() > MAX_BUFFER {
        return Err(TpmKeysError::PayloadTooLarge {
            size: data.len(),
            max: MAX_BUFFER,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftwareModule;

    #[test]
    fn test_tag_sizes_follow_hash() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        for hash in HashAlg::IMPLEMENTED {
            let tag = session.hmac(Hierarchy::Owner, hash, b"data").unwrap();
            assert_eq!(tag.len(), hash.digest_size());
        }
        assert!(session.transient_handles().unwrap().is_empty());
    }

    #[test]
    fn test_tag_is_deterministic_per_hierarchy() {
        let module = SoftwareModule::in_memory();
        let session = Session::new(module.connect());
        let first = session.hmac(Hierarchy::Owner, HashAlg::Sha256, b"data").unwrap();
        let again = Session::new(module.connect())
            .hmac(Hierarchy::Owner, HashAlg::Sha256, b"data")
            .unwrap();
        let endorsement = session
            .hmac(Hierarchy::Endorsement, HashAlg::Sha256, b"data")
            .unwrap();

        assert_eq!(first, again);
        assert_ne!(first, endorsement);
    }

    #[test]
    fn test_oversized_input() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        assert!(matches!(
            session.hmac(Hierarchy::Owner, HashAlg::Sha256, &[0; MAX_BUFFER + 1]),
            Err(TpmKeysError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_unimplemented_hash() {
        let session = Session::new(SoftwareModule::in_memory().connect());
        assert!(matches!(
            session.hmac(Hierarchy::Owner, HashAlg::Sm3_256, b"data"),
            Err(TpmKeysError::UnsupportedAlgorithm { .. })
        ));
    }
}
