//! Use cases (orchestration)
//!
//! File-level workflows behind the command line. Each one opens a session on
//! a [`ModuleOpener`](crate::ports::ModuleOpener), re-derives the owner
//! storage parent, does its work and closes the session again, so every
//! transient object is gone when the use case returns.

mod keys;
mod module;
mod persist;
mod protect;
mod signing;

pub use keys::{create_key, export_public_key, load_key, KeyInfo};
pub use module::{hmac_data, module_info};
pub use persist::{persist_key, read_persisted_key, unpersist_key};
pub use protect::{decrypt, encrypt, seal_data, sym_decrypt, sym_encrypt, unseal_data};
pub use signing::{sign_message, verify_signature};

use crate::model::{catalog, Hierarchy, KeyTemplate};

/// Hierarchy every key file is created and loaded under
pub const KEY_HIERARCHY: Hierarchy = Hierarchy::Owner;

/// Storage parent re-derived for every key file operation
pub fn storage_parent() -> KeyTemplate {
    catalog::ecc_storage_parent()
}
