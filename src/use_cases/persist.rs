//! Moving key files into persistent slots and back out

use std::path::Path;

use tracing::info;

use super::{storage_parent, KEY_HIERARCHY};
use crate::error::{TpmKeysError, TpmKeysResult};
use crate::export::PublicKey;
use crate::files;
use crate::model::{KeyBlob, Name, PersistentHandle};
use crate::ports::ModuleOpener;
use crate::session::{with_session, ObjectRef};

/// Loads `key_file` and makes it persistent in `slot`.
///
/// With `remove_key_file` set the blob is deleted once the module holds the
/// object, so the slot becomes the only copy.
///
/// # Errors
///
/// [`TpmKeysError::SlotOccupied`] when `slot` is taken. The key file is
/// left untouched on any error.
pub fn persist_key<O: ModuleOpener>(
    opener: &O,
    key_file: &Path,
    slot: PersistentHandle,
    remove_key_file: bool,
) -> TpmKeysResult<Name> {
    let blob = KeyBlob::read_file(key_file)?;
    let name = with_session(opener, |session| {
        let key = session.load_under_primary(KEY_HIERARCHY, &storage_parent(), &blob)?;
        let persisted = session.persist(&key, slot)?;
        Ok(persisted.name().clone())
    })?;
    if remove_key_file {
        files::remove(key_file)?;
        info!(path = %key_file.display(), "key file removed");
    }
    Ok(name)
}

/// Reads the public key held in `slot`.
///
/// When `reference_pem` is given the slot must hold exactly that key,
/// otherwise [`TpmKeysError::PublicKeyMismatch`].
pub fn read_persisted_key<O: ModuleOpener>(
    opener: &O,
    slot: PersistentHandle,
    reference_pem: Option<&Path>,
) -> TpmKeysResult<PublicKey> {
    let persisted = with_session(opener, |session| session.read_persisted(slot))?;
    let public = PublicKey::from_public_area(persisted.public())?;
    if let Some(path) = reference_pem {
        let pem = files::read_input(path)?;
        let reference = PublicKey::from_pem(&String::from_utf8_lossy(&pem))?;
        if reference != public {
            return Err(TpmKeysError::PublicKeyMismatch {
                slot: slot.handle(),
            });
        }
    }
    Ok(public)
}

pub fn unpersist_key<O: ModuleOpener>(opener: &O, slot: PersistentHandle) -> TpmKeysResult<()> {
    with_session(opener, |session| session.unpersist(slot))
}
