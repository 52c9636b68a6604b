//! Cryptographic operations on loaded objects
//!
//! Each operation is a method on [`Session`](crate::session::Session). Key
//! type selection is a match on the object's [`KeyParams`](crate::model::KeyParams);
//! attribute checks that the module would make are repeated here so that a
//! misuse fails before a module round-trip and names the broken precondition.

mod decrypt;
mod hmac;
mod seal;
mod sign;
mod symmetric;

pub use decrypt::OAEP_HASH;
pub use symmetric::SYM_IV_SIZE;

use crate::error::TpmKeysError;
use crate::ports::Operation;
use crate::session::ObjectRef;

fn not_permitted(operation: Operation, key: &impl ObjectRef, reason: &str) -> TpmKeysError {
    TpmKeysError::AuthorizationDenied {
        operation,
        handle: key.handle(),
        reason: reason.to_string(),
    }
}
