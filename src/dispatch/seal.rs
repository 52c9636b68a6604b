//! Sealing caller data into keyed-hash objects and releasing it again

use crate::error::{TpmKeysError, TpmKeysResult};
use crate::model::{catalog, HashAlg, Hierarchy, KeyBlob, SensitiveCreate, MAX_SEALED_DATA};
use crate::ports::{Command, ModuleFault, Operation, Response, ResponseCode, Transport};
use crate::session::{unexpected, LoadedObject, ObjectRef, Session};

impl<T: Transport> Session<T> {
    /// Seals `payload` under `parent` and returns the at-rest object.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::PayloadTooLarge`] above [`MAX_SEALED_DATA`] bytes,
    /// whichever name algorithm is used.
    pub fn seal(
        &self,
        parent: &impl ObjectRef,
        payload: &[u8],
        name_alg: HashAlg,
    ) -> TpmKeysResult<KeyBlob> {
        check_payload(payload)?;
        self.create_child(
            parent,
            &catalog::sealed_data(name_alg)?,
            SensitiveCreate::with_data(payload.to_vec()),
        )
    }

    /// Seals `payload` into a primary object of `hierarchy`.
    pub fn seal_primary(
        &self,
        hierarchy: Hierarchy,
        payload: &[u8],
        name_alg: HashAlg,
    ) -> TpmKeysResult<LoadedObject<'_, T>> {
        check_payload(payload)?;
        self.create_primary_with(
            hierarchy,
            &catalog::sealed_data(name_alg)?,
            SensitiveCreate::with_data(payload.to_vec()),
        )
    }

    /// Returns the data sealed in `item`.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::NotSealable`] when `item` is not a sealed-data object.
    pub fn unseal(&self, item: &impl ObjectRef) -> TpmKeysResult<Vec<u8>> {
        let not_sealable = || TpmKeysError::NotSealable {
            handle: item.handle(),
        };
        if !item.public().is_sealed_data() {
            return Err(not_sealable());
        }
        let response = self
            .execute(Command::Unseal {
                item: item.auth_handle(),
            })
            .map_err(|fault| match fault {
                ModuleFault::Rejected(ResponseCode::Type) => not_sealable(),
                other => TpmKeysError::from_fault(Operation::Unseal, item.handle(), other),
            })?;
        match response {
            Response::Unseal { data } => Ok(data),
            _ => Err(unexpected(Operation::Unseal)),
        }
    }
}

fn check_payload(payload: &[u8]) -> TpmKeysResult<()> {
    if payload.len() > MAX_SEALED_DATA {
        return Err(TpmKeysError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_SEALED_DATA,
        });
    }
    Ok(())
}
