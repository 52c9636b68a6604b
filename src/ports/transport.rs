//! Transport trait - the only way the core reaches a module

use thiserror::Error;

use super::command::{Command, Response};
use crate::error::TpmKeysResult;

/// Command channel to one security module.
///
/// A transport is owned by a single session and is not shared between
/// threads. Objects loaded through a transport belong to it; closing the
/// transport releases them.
pub trait Transport {
    /// Execute one command and return the module's response
    ///
    /// # Errors
    ///
    /// Returns [`ModuleFault::Rejected`] with the module's response code when
    /// the module refuses the command, or [`ModuleFault::Transport`] when the
    /// command never completed.
    fn execute(&mut self, command: Command) -> Result<Response, ModuleFault>;

    /// Close the channel. Further commands fail with a transport fault.
    fn close(&mut self) -> Result<(), ModuleFault> {
        Ok(())
    }
}

/// Opens transports to a module, one per session
pub trait ModuleOpener {
    type Transport: Transport;

    fn open(&self) -> TpmKeysResult<Self::Transport>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleFault {
    #[error("module returned {0:?}: {0}")]
    Rejected(#[from] ResponseCode),

    #[error("transport failure: {reason}")]
    Transport { reason: String },
}

/// Reasons a module gives for refusing a command
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    #[error("object attributes are inconsistent or do not permit this operation")]
    Attributes,
    #[error("scheme is unsupported or does not match the key")]
    Scheme,
    #[error("symmetric definition is invalid")]
    Symmetric,
    #[error("hash algorithm is not supported")]
    Hash,
    #[error("curve is not supported")]
    Curve,
    #[error("key size is not supported")]
    KeySize,
    #[error("mode does not match the key")]
    Mode,
    #[error("object type is not valid for this operation")]
    Type,
    #[error("value or buffer size is out of range")]
    Size,
    #[error("integrity check failed")]
    Integrity,
    #[error("public and sensitive areas are not bound")]
    Binding,
    #[error("handle does not reference an object")]
    Handle,
    #[error("name or authorization value does not match the object")]
    BadAuth,
    #[error("object does not accept password authorization")]
    AuthUnavailable,
    #[error("hash-check ticket is not valid")]
    Ticket,
    #[error("hierarchy is not valid for this operation")]
    Hierarchy,
    #[error("value is not correct for the context")]
    Value,
    #[error("no room for another loaded object")]
    ObjectMemory,
    #[error("persistent handle is already in use")]
    NvDefined,
    #[error("no room for another persistent object")]
    NvSpace,
    #[error("handle is outside the permitted range")]
    Range,
}
