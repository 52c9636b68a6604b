//! Key lifecycle management on a TPM-style security module
//!
//! Keys are created from a fixed template catalog, leave the module only as
//! opaque wrapped blobs, are loaded back under a re-derived storage parent
//! and can be made persistent. Every handle the module hands out is checked
//! against the name computed from its public area before it is used, and
//! restricted signing keys only sign digests the module hashed itself.

mod adapters;
pub mod api;
pub mod codec;
pub mod config;
mod derivation;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod files;
mod lifecycle;
pub mod model;
pub mod ports;
pub mod session;
pub mod use_cases;

// Re-export commonly used types
pub use adapters::{SoftwareConnection, SoftwareModule};
pub use config::ModuleConfig;
pub use error::{TpmKeysError, TpmKeysResult};
pub use export::PublicKey;
pub use session::{with_session, LoadedObject, ObjectRef, PersistentObject, Session};
