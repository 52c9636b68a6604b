//! Public API: the use cases bound to the software module

use std::path::Path;

use crate::adapters::SoftwareModule;
use crate::codec::EncryptedBlob;
use crate::config::ModuleConfig;
use crate::error::TpmKeysResult;
use crate::export::PublicKey;
use crate::ports::ModuleProperties;
use crate::use_cases;

pub use crate::model::*;

/// Opens the software module described by `config`.
pub fn open_module(config: &ModuleConfig) -> TpmKeysResult<SoftwareModule> {
    SoftwareModule::open(config)
}

/// Deletes the saved module state: seeds are regenerated on next open and
/// every persisted object is lost. Returns whether there was anything to delete.
pub fn reset_module(config: &ModuleConfig) -> TpmKeysResult<bool> {
    SoftwareModule::reset(config)
}

pub fn create_key(
    config: &ModuleConfig,
    kind: KeyKind,
    auth: AuthValue,
    key_file: &Path,
) -> TpmKeysResult<use_cases::KeyInfo> {
    use_cases::create_key(&open_module(config)?, kind, auth, key_file)
}

pub fn load_key(config: &ModuleConfig, key_file: &Path) -> TpmKeysResult<use_cases::KeyInfo> {
    use_cases::load_key(&open_module(config)?, key_file)
}

pub fn sign(
    config: &ModuleConfig,
    key_file: &Path,
    auth: AuthValue,
    message: &[u8],
    signature_file: &Path,
) -> TpmKeysResult<Vec<u8>> {
    use_cases::sign_message(&open_module(config)?, key_file, auth, message, signature_file)
}

pub fn decrypt(
    config: &ModuleConfig,
    key_file: &Path,
    auth: AuthValue,
    ciphertext: &[u8],
) -> TpmKeysResult<Vec<u8>> {
    use_cases::decrypt(&open_module(config)?, key_file, auth, ciphertext)
}

pub fn sym_encrypt(
    config: &ModuleConfig,
    key_file: &Path,
    auth: AuthValue,
    plaintext: &[u8],
    output: &Path,
) -> TpmKeysResult<EncryptedBlob> {
    use_cases::sym_encrypt(&open_module(config)?, key_file, auth, plaintext, output)
}

pub fn sym_decrypt(
    config: &ModuleConfig,
    key_file: &Path,
    auth: AuthValue,
    input: &Path,
) -> TpmKeysResult<Vec<u8>> {
    use_cases::sym_decrypt(&open_module(config)?, key_file, auth, input)
}

pub fn seal(
    config: &ModuleConfig,
    payload: &[u8],
    name_alg: HashAlg,
    sealed_file: &Path,
) -> TpmKeysResult<()> {
    use_cases::seal_data(&open_module(config)?, payload, name_alg, sealed_file)
}

pub fn unseal(config: &ModuleConfig, sealed_file: &Path) -> TpmKeysResult<Vec<u8>> {
    use_cases::unseal_data(&open_module(config)?, sealed_file)
}

pub fn hmac(config: &ModuleConfig, hash: HashAlg, data: &[u8]) -> TpmKeysResult<Vec<u8>> {
    use_cases::hmac_data(&open_module(config)?, hash, data)
}

pub fn persist(
    config: &ModuleConfig,
    key_file: &Path,
    slot: PersistentHandle,
    remove_key_file: bool,
) -> TpmKeysResult<Name> {
    use_cases::persist_key(&open_module(config)?, key_file, slot, remove_key_file)
}

pub fn read_persisted(
    config: &ModuleConfig,
    slot: PersistentHandle,
    reference_pem: Option<&Path>,
) -> TpmKeysResult<PublicKey> {
    use_cases::read_persisted_key(&open_module(config)?, slot, reference_pem)
}

pub fn unpersist(config: &ModuleConfig, slot: PersistentHandle) -> TpmKeysResult<()> {
    use_cases::unpersist_key(&open_module(config)?, slot)
}

pub fn info(config: &ModuleConfig) -> TpmKeysResult<(ModuleProperties, Vec<Handle>)> {
    use_cases::module_info(&open_module(config)?)
}

pub use use_cases::{encrypt, export_public_key, verify_signature, KeyInfo};
