//! Create key files and inspect them

use std::path::Path;

use tracing::info;

use super::{storage_parent, KEY_HIERARCHY};
use crate::error::TpmKeysResult;
use crate::export::PublicKey;
use crate::files;
use crate::model::{AuthValue, KeyBlob, KeyKind, Name, ObjectType, SensitiveCreate};
use crate::ports::ModuleOpener;
use crate::session::{with_session, ObjectRef};

/// What the module reports about a loaded key file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: Name,
    pub object_type: ObjectType,
    pub restricted: bool,
    /// PEM public key, absent for symmetric and keyed-hash objects
    pub public_pem: Option<String>,
}

/// Creates a key of `kind` under the owner storage parent and writes its
/// at-rest blob to `key_file`.
///
/// # Errors
///
/// Returns errors if the module refuses the template, or the blob cannot be
/// written.
pub fn create_key<O: ModuleOpener>(
    opener: &O,
    kind: KeyKind,
    auth: AuthValue,
    key_file: &Path,
) -> TpmKeysResult<KeyInfo> {
    let blob = with_session(opener, |session| {
        let parent = session.create_primary(KEY_HIERARCHY, &storage_parent())?;
        session.create_child(&parent, &kind.template(), SensitiveCreate::with_auth(auth))
    })?;
    blob.write_file(key_file)?;
    info!(kind = %kind, path = %key_file.display(), "key file written");
    describe(&blob)
}

/// Loads `key_file` to prove the module accepts it and reports what it holds.
pub fn load_key<O: ModuleOpener>(opener: &O, key_file: &Path) -> TpmKeysResult<KeyInfo> {
    let blob = KeyBlob::read_file(key_file)?;
    with_session(opener, |session| {
        let key = session.load_under_primary(KEY_HIERARCHY, &storage_parent(), &blob)?;
        let (public, name) = session.read_public(key.handle())?;
        Ok(KeyInfo {
            name,
            object_type: public.object_type(),
            restricted: public.is_restricted(),
            public_pem: pem_for(&public)?,
        })
    })
}

/// Writes the PEM public key of `key_file` to `pem_file`.
pub fn export_public_key(key_file: &Path, pem_file: &Path) -> TpmKeysResult<()> {
    let blob = KeyBlob::read_file(key_file)?;
    let pem = PublicKey::from_public_area(blob.public())?.to_pem()?;
    files::write_public(pem_file, pem.as_bytes())
}

fn describe(blob: &KeyBlob) -> TpmKeysResult<KeyInfo> {
    let public = blob.public();
    Ok(KeyInfo {
        name: public.name()?,
        object_type: public.object_type(),
        restricted: public.is_restricted(),
        public_pem: pem_for(public)?,
    })
}

fn pem_for(public: &crate::model::PublicArea) -> TpmKeysResult<Option<String>> {
    match public.object_type() {
        ObjectType::Rsa | ObjectType::Ecc => Ok(Some(PublicKey::from_public_area(public)?.to_pem()?)),
        ObjectType::SymCipher | ObjectType::KeyedHash => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftwareModule;
    use crate::error::TpmKeysError;

    #[test]
    fn test_create_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.tpm");
        let module = SoftwareModule::in_memory();

        let created = create_key(&module, KeyKind::Signer, AuthValue::empty(), &key_file).unwrap();
        assert!(created.public_pem.is_some());

        let loaded = load_key(&module, &key_file).unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn test_symmetric_key_has_no_pem() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.tpm");
        let module = SoftwareModule::in_memory();

        let info = create_key(&module, KeyKind::Symmetric, AuthValue::empty(), &key_file).unwrap();
        assert_eq!(info.object_type, ObjectType::SymCipher);
        assert_eq!(info.public_pem, None);
        assert!(matches!(
            export_public_key(&key_file, &dir.path().join("public.pem")),
            Err(TpmKeysError::KeyFormat { .. })
        ));
    }

    #[test]
    fn test_key_file_from_other_module_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.tpm");
        create_key(
            &SoftwareModule::in_memory(),
            KeyKind::Decrypt,
            AuthValue::empty(),
            &key_file,
        )
        .unwrap();

        assert!(matches!(
            load_key(&SoftwareModule::in_memory(), &key_file),
            Err(TpmKeysError::IntegrityFailure { .. })
        ));
    }

    #[test]
    fn test_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_key(&SoftwareModule::in_memory(), &dir.path().join("absent.tpm")),
            Err(TpmKeysError::Io { .. })
        ));
    }
}
