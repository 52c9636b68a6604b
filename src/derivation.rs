//! Primary and child object derivation

use tracing::{debug, info};

use crate::error::{TpmKeysError, TpmKeysResult};
use crate::model::{
    AuthValueError, Hierarchy, KeyBlob, KeyTemplate, ObjectAttributes, ObjectType,
    SensitiveCreate, MAX_SEALED_DATA,
};
use crate::ports::{Command, ModuleFault, Operation, Response, ResponseCode, Transport};
use crate::session::{unexpected, LoadedObject, ObjectRef, Session};

impl<T: Transport> Session<T> {
    /// Derives a primary object from the hierarchy seed and `template`.
    ///
    /// The same hierarchy and template always yield the same name and public
    /// key for as long as the hierarchy seed is unchanged.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::TemplateRejected`] before any module call when the
    /// template is inconsistent, [`TpmKeysError::IdentityMismatch`] when the
    /// name the module reports is not the name of the public area it returned.
    pub fn create_primary(
        &self,
        hierarchy: Hierarchy,
        template: &KeyTemplate,
    ) -> TpmKeysResult<LoadedObject<'_, T>> {
        self.create_primary_with(hierarchy, template, SensitiveCreate::default())
    }

    /// [`Session::create_primary`] with a password and, for sealed data, a payload.
    pub fn create_primary_with(
        &self,
        hierarchy: Hierarchy,
        template: &KeyTemplate,
        sensitive: SensitiveCreate,
    ) -> TpmKeysResult<LoadedObject<'_, T>> {
        template.validate()?;
        check_sensitive(template, &sensitive)?;
        let auth = sensitive.user_auth().clone();

        let response = self.run(
            Command::CreatePrimary {
                hierarchy,
                template: template.to_public(),
                sensitive,
            },
            hierarchy.handle(),
        )?;
        let Response::CreatePrimary {
            handle,
            public,
            name,
        } = response
        else {
            return Err(unexpected(Operation::CreatePrimary));
        };

        // Guard first so a failed identity check still flushes the handle.
        let object = LoadedObject::new(self, handle, name, public).with_auth(auth);
        let computed = object.public().name()?;
        if &computed != object.name() {
            return Err(TpmKeysError::IdentityMismatch {
                handle,
                expected: computed,
                actual: object.name().clone(),
            });
        }
        info!(%hierarchy, %handle, name = %computed, "primary object ready");
        Ok(object)
    }

    /// Creates a child of `parent` and returns it in its at-rest form.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::ParentNotAuthorized`] when the parent is not a
    /// restricted decryption key, [`TpmKeysError::PayloadTooLarge`] when the
    /// sealing payload exceeds [`MAX_SEALED_DATA`]. Both are checked before
    /// the module is asked and again mapped from its answer.
    pub fn create_child(
        &self,
        parent: &impl ObjectRef,
        template: &KeyTemplate,
        sensitive: SensitiveCreate,
    ) -> TpmKeysResult<KeyBlob> {
        if !parent.public().is_storage_parent() {
            return Err(not_a_parent(parent));
        }
        template.validate()?;
        check_sensitive(template, &sensitive)?;
        let payload = sensitive.data().len();

        let response = self
            .execute(Command::Create {
                parent: parent.auth_handle(),
                template: template.to_public(),
                sensitive,
            })
            .map_err(|fault| match fault {
                ModuleFault::Rejected(ResponseCode::Type) => not_a_parent(parent),
                ModuleFault::Rejected(ResponseCode::Size) if payload > 0 => {
                    TpmKeysError::PayloadTooLarge {
                        size: payload,
                        max: MAX_SEALED_DATA,
                    }
                }
                other => TpmKeysError::from_fault(Operation::Create, parent.handle(), other),
            })?;
        let Response::Create { public, private } = response else {
            return Err(unexpected(Operation::Create));
        };
        debug!(parent = %parent.handle(), kind = %public.object_type(), "child object created");
        Ok(KeyBlob::new(public, private))
    }
}

fn not_a_parent(parent: &impl ObjectRef) -> TpmKeysError {
    TpmKeysError::ParentNotAuthorized {
        parent: parent.handle(),
        reason: "non-storage parent cannot create or load children; \
                 restricted and decrypt are both required"
            .to_string(),
    }
}

/// Limits on the caller's secrets that the module would otherwise enforce.
fn check_sensitive(template: &KeyTemplate, sensitive: &SensitiveCreate) -> TpmKeysResult<()> {
    let max_auth = template.name_alg.digest_size();
    if sensitive.user_auth().len() > max_auth {
        return Err(AuthValueError::LongerThanNameDigest {
            max: max_auth,
            actual: sensitive.user_auth().len(),
        }
        .into());
    }
    let data = sensitive.data();
    if data.is_empty() {
        return Ok(());
    }
    if template.object_type() != ObjectType::KeyedHash
        || template
            .attributes
            .contains(ObjectAttributes::SENSITIVE_DATA_ORIGIN)
    {
        return Err(TpmKeysError::TemplateRejected {
            reason: "only keyed-hash objects without sensitiveDataOrigin accept caller data"
                .to_string(),
        });
    }
    if data.len() > MAX_SEALED_DATA {
        return Err(TpmKeysError::PayloadTooLarge {
            size: data.len(),
            max: MAX_SEALED_DATA,
        });
    }
    Ok(())
}
