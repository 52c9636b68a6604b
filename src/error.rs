//! Error types for tpmkeys
//!
//! Every operation reports one [`TpmKeysError`]. Local validation failures,
//! module rejections and transport failures all land here, carrying the
//! operation and handle involved.

use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;
use crate::model::{
    AlgorithmError, AuthValueError, Handle, HandleError, Name, PrivateBlobError, TemplateError,
};
use crate::ports::{ModuleFault, Operation, ResponseCode};

/// Result type alias for tpmkeys operations
pub type TpmKeysResult<T> = Result<T, TpmKeysError>;

#[derive(Error, Debug)]
pub enum TpmKeysError {
    /// Attribute or parameter combination the module refuses
    #[error("Template rejected: {reason}")]
    TemplateRejected { reason: String },

    /// Create or load under an object that is not a storage parent
    #[error("Object {parent} cannot act as a parent: {reason}")]
    ParentNotAuthorized { parent: Handle, reason: String },

    #[error("Payload of {size} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Malformed key blob: {reason}")]
    MalformedBlob { reason: String },

    /// The module reported a name that differs from the one computed locally
    #[error("Identity mismatch at {handle}: expected name {expected}, module reported {actual}")]
    IdentityMismatch {
        handle: Handle,
        expected: Name,
        actual: Name,
    },

    #[error("Persistent slot {slot} is already occupied")]
    SlotOccupied { slot: Handle },

    #[error("No object at {handle}")]
    NotFound { handle: Handle },

    #[error("{operation} on {handle} was not authorized: {reason}")]
    AuthorizationDenied {
        operation: Operation,
        handle: Handle,
        reason: String,
    },

    /// Deliberately carries nothing about which step failed.
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Initialization vector must be {expected} bytes, got {actual}")]
    InvalidIv { expected: usize, actual: usize },

    #[error("Object at {handle} is not sealed data")]
    NotSealable { handle: Handle },

    #[error("Algorithm not supported: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("Handle {value:#010x} is outside the permitted range")]
    InvalidHandleRange { value: u32 },

    #[error("Cannot parse handle from '{input}'")]
    HandleSyntax { input: String },

    /// The module could not be opened or its saved state is unusable
    #[error("Security module unavailable: {reason}")]
    ModuleUnavailable { reason: String },

    #[error("Transport failure during {operation}: {reason}")]
    Transport { operation: Operation, reason: String },

    /// A private area failed its integrity or binding check
    #[error("Integrity check failed for {handle} during {operation}: {reason}")]
    IntegrityFailure {
        operation: Operation,
        handle: Handle,
        reason: String,
    },

    #[error("Module resources exhausted during {operation}: {reason}")]
    ResourceExhausted { operation: Operation, reason: String },

    /// Any other module rejection, reported verbatim
    #[error("Module rejected {operation}: {code}")]
    Module {
        operation: Operation,
        code: ResponseCode,
    },

    #[error("Invalid key format: {reason}")]
    KeyFormat { reason: String },

    #[error("Public key in {slot} does not match the reference key")]
    PublicKeyMismatch { slot: Handle },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid auth value: {0}")]
    InvalidAuth(#[from] AuthValueError),
}

impl TpmKeysError {
    /// Maps a module fault to the error taxonomy.
    ///
    /// `target` is the entity the command addressed. Callers that know more
    /// about an operation's failure modes match those codes first and fall
    /// back to this mapping.
    pub fn from_fault(operation: Operation, target: Handle, fault: ModuleFault) -> Self {
        let code = match fault {
            ModuleFault::Transport { reason } => {
                return TpmKeysError::Transport { operation, reason }
            }
            ModuleFault::Rejected(code) => code,
        };
        match code {
            ResponseCode::Handle => TpmKeysError::NotFound { handle: target },
            ResponseCode::BadAuth
            | ResponseCode::AuthUnavailable
            | ResponseCode::Ticket
            | ResponseCode::Hierarchy => TpmKeysError::AuthorizationDenied {
                operation,
                handle: target,
                reason: code.to_string(),
            },
            ResponseCode::Integrity | ResponseCode::Binding => TpmKeysError::IntegrityFailure {
                operation,
                handle: target,
                reason: code.to_string(),
            },
            ResponseCode::ObjectMemory | ResponseCode::NvSpace => {
                TpmKeysError::ResourceExhausted {
                    operation,
                    reason: code.to_string(),
                }
            }
            ResponseCode::NvDefined => TpmKeysError::SlotOccupied { slot: target },
            ResponseCode::Range => TpmKeysError::InvalidHandleRange {
                value: target.value(),
            },
            ResponseCode::Hash | ResponseCode::Curve | ResponseCode::KeySize => {
                TpmKeysError::UnsupportedAlgorithm {
                    algorithm: code.to_string(),
                }
            }
            _ => TpmKeysError::Module { operation, code },
        }
    }

    /// The module response code, when the module itself refused.
    pub fn response_code(&self) -> Option<ResponseCode> {
        match self {
            TpmKeysError::Module { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<CodecError> for TpmKeysError {
    fn from(err: CodecError) -> Self {
        TpmKeysError::MalformedBlob {
            reason: err.to_string(),
        }
    }
}

impl From<AlgorithmError> for TpmKeysError {
    fn from(err: AlgorithmError) -> Self {
        TpmKeysError::UnsupportedAlgorithm {
            algorithm: match err {
                AlgorithmError::Unsupported { algorithm } => algorithm,
                other => other.to_string(),
            },
        }
    }
}

impl From<TemplateError> for TpmKeysError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::Algorithm(inner) => inner.into(),
            other => TpmKeysError::TemplateRejected {
                reason: other.to_string(),
            },
        }
    }
}

impl From<HandleError> for TpmKeysError {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::OutOfRange { value } => TpmKeysError::InvalidHandleRange { value },
            HandleError::Parse { input } => TpmKeysError::HandleSyntax { input },
        }
    }
}

impl From<PrivateBlobError> for TpmKeysError {
    fn from(err: PrivateBlobError) -> Self {
        TpmKeysError::MalformedBlob {
            reason: err.to_string(),
        }
    }
}
