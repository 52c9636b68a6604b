//! Object lifecycle: at-rest blobs, loading, persistence and eviction
//!
//! An object moves from a freshly created transient handle to an at-rest
//! [`KeyBlob`], back into the module under a re-derived parent, and
//! optionally into a persistent slot until it is evicted again.

use std::path::Path;

use tracing::{debug, info};

use crate::codec::{decode_key_blob, encode_key_blob};
use crate::error::{TpmKeysError, TpmKeysResult};
use crate::files;
use crate::model::{AuthValue, Hierarchy, KeyBlob, KeyTemplate, PersistentHandle};
use crate::ports::{Command, ModuleFault, Operation, Response, ResponseCode, Transport};
use crate::session::{unexpected, LoadedObject, ObjectRef, PersistentObject, Session};

/// Hierarchy that authorizes persistence and eviction
const PERSIST_AUTH: Hierarchy = Hierarchy::Owner;

impl<T: Transport> Session<T> {
    /// Loads `blob` under `parent`.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::IdentityMismatch`] when the name the module assigns
    /// differs from the name of the blob's public area. The transient handle
    /// is flushed before the error is returned.
    pub fn load(
        &self,
        parent: &impl ObjectRef,
        blob: &KeyBlob,
    ) -> TpmKeysResult<LoadedObject<'_, T>> {
        if !parent.public().is_storage_parent() {
            return Err(TpmKeysError::ParentNotAuthorized {
                parent: parent.handle(),
                reason: "only restricted decryption keys can load children".to_string(),
            });
        }
        let expected = blob.public().name()?;

        let response = self.run(
            Command::Load {
                parent: parent.auth_handle(),
                public: blob.public().clone(),
                private: blob.private().clone(),
            },
            parent.handle(),
        )?;
        let Response::Load { handle, name } = response else {
            return Err(unexpected(Operation::Load));
        };

        let object = LoadedObject::new(self, handle, name, blob.public().clone());
        if object.name() != &expected {
            return Err(TpmKeysError::IdentityMismatch {
                handle,
                expected,
                actual: object.name().clone(),
            });
        }
        debug!(%handle, name = %expected, "object loaded");
        Ok(object)
    }

    /// Re-derives the primary described by `parent_template` and loads
    /// `blob` under it. Only the loaded object stays in the module.
    pub fn load_under_primary(
        &self,
        hierarchy: Hierarchy,
        parent_template: &KeyTemplate,
        blob: &KeyBlob,
    ) -> TpmKeysResult<LoadedObject<'_, T>> {
        let parent = self.create_primary(hierarchy, parent_template)?;
        let object = self.load(&parent, blob)?;
        parent.release()?;
        Ok(object)
    }

    /// Moves `object` into `slot` and reads it back from there.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::SlotOccupied`] when the slot already holds an object.
    pub fn persist(
        &self,
        object: &impl ObjectRef,
        slot: PersistentHandle,
    ) -> TpmKeysResult<PersistentObject> {
        self.execute(Command::EvictControl {
            auth: PERSIST_AUTH,
            object: object.named_handle(),
            persistent: slot.handle(),
        })
        .map_err(|fault| {
            let target = match fault {
                ModuleFault::Rejected(ResponseCode::NvDefined | ResponseCode::Range) => {
                    slot.handle()
                }
                _ => object.handle(),
            };
            TpmKeysError::from_fault(Operation::EvictControl, target, fault)
        })?;

        let persisted = self.read_persisted(slot)?;
        if persisted.name() != object.name() {
            return Err(TpmKeysError::IdentityMismatch {
                handle: slot.handle(),
                expected: object.name().clone(),
                actual: persisted.name().clone(),
            });
        }
        info!(%slot, name = %persisted.name(), "object persisted");
        Ok(persisted.with_auth(object.auth().clone()))
    }

    /// Reads the object in `slot` without needing its private area.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::NotFound`] when the slot is empty.
    pub fn read_persisted(&self, slot: PersistentHandle) -> TpmKeysResult<PersistentObject> {
        let (public, name) = self.read_public(slot.handle())?;
        Ok(PersistentObject {
            handle: slot.handle(),
            name,
            public,
            auth: AuthValue::empty(),
        })
    }

    /// Evicts the object in `slot`. An empty slot is [`TpmKeysError::NotFound`].
    pub fn unpersist(&self, slot: PersistentHandle) -> TpmKeysResult<()> {
        let existing = self.read_persisted(slot)?;
        self.run(
            Command::EvictControl {
                auth: PERSIST_AUTH,
                object: existing.named_handle(),
                persistent: slot.handle(),
            },
            slot.handle(),
        )?;
        info!(%slot, "object evicted");
        Ok(())
    }
}

impl KeyBlob {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_key_blob(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> TpmKeysResult<Self> {
        Ok(decode_key_blob(bytes)?)
    }

    /// Writes the blob readable by the owner only.
    pub fn write_file(&self, path: &Path) -> TpmKeysResult<()> {
        files::write_secret(path, &self.to_bytes())
    }

    pub fn read_file(path: &Path) -> TpmKeysResult<Self> {
        Self::from_bytes(&files::read_input(path)?)
    }
}
