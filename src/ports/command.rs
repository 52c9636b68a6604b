//! Command and response vocabulary spoken over a transport

use std::fmt;

use crate::model::{
    AuthValue, Handle, HashAlg, HashCheckTicket, Hierarchy, Name, PrivateBlob, PublicArea,
    SensitiveCreate, SigScheme, Signature, SymMode,
};

/// Largest data buffer a single command accepts
pub const MAX_BUFFER: usize = 1024;

/// Most bytes one `GetRandom` returns, whatever was requested
pub const MAX_RANDOM_BYTES: usize = 64;

/// Handle paired with the name the caller expects to find there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedHandle {
    pub handle: Handle,
    pub name: Name,
}

/// Named handle plus the password authorizing its use
#[derive(Debug, Clone)]
pub struct AuthHandle {
    pub handle: Handle,
    pub name: Name,
    pub auth: AuthValue,
}

impl AuthHandle {
    pub fn named(&self) -> NamedHandle {
        NamedHandle {
            handle: self.handle,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Loaded handles starting at `first`, at most `max` of them
    Handles { first: Handle, max: u32 },
    Properties,
}

/// Fixed module properties reported by [`Capability::Properties`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProperties {
    pub family: String,
    pub manufacturer: String,
    pub firmware_version: String,
    pub transient_slots: u32,
    pub persistent_slots: u32,
    pub persistent_loaded: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityData {
    Handles(Vec<Handle>),
    Properties(ModuleProperties),
}

/// Operation code of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreatePrimary,
    Create,
    Load,
    ReadPublic,
    FlushContext,
    EvictControl,
    Hash,
    Sign,
    RsaDecrypt,
    EncryptDecrypt,
    Unseal,
    Hmac,
    GetCapability,
    GetRandom,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    CreatePrimary {
        hierarchy: Hierarchy,
        template: PublicArea,
        sensitive: SensitiveCreate,
    },
    Create {
        parent: AuthHandle,
        template: PublicArea,
        sensitive: SensitiveCreate,
    },
    Load {
        parent: AuthHandle,
        public: PublicArea,
        private: PrivateBlob,
    },
    ReadPublic {
        handle: Handle,
    },
    FlushContext {
        handle: Handle,
    },
    /// Persists a transient object, or evicts a persistent one when `object`
    /// already is the persistent handle.
    EvictControl {
        auth: Hierarchy,
        object: NamedHandle,
        persistent: Handle,
    },
    Hash {
        data: Vec<u8>,
        hash_alg: HashAlg,
        hierarchy: Hierarchy,
    },
    Sign {
        key: AuthHandle,
        digest: Vec<u8>,
        scheme: Option<SigScheme>,
        validation: HashCheckTicket,
    },
    RsaDecrypt {
        key: AuthHandle,
        ciphertext: Vec<u8>,
        oaep_hash: HashAlg,
    },
    EncryptDecrypt {
        key: AuthHandle,
        decrypt: bool,
        mode: SymMode,
        iv: Vec<u8>,
        data: Vec<u8>,
    },
    Unseal {
        item: AuthHandle,
    },
    Hmac {
        key: AuthHandle,
        data: Vec<u8>,
    },
    GetCapability {
        capability: Capability,
    },
    GetRandom {
        bytes_requested: u16,
    },
}

impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Command::CreatePrimary { .. } => Operation::CreatePrimary,
            Command::Create { .. } => Operation::Create,
            Command::Load { .. } => Operation::Load,
            Command::ReadPublic { .. } => Operation::ReadPublic,
            Command::FlushContext { .. } => Operation::FlushContext,
            Command::EvictControl { .. } => Operation::EvictControl,
            Command::Hash { .. } => Operation::Hash,
            Command::Sign { .. } => Operation::Sign,
            Command::RsaDecrypt { .. } => Operation::RsaDecrypt,
            Command::EncryptDecrypt { .. } => Operation::EncryptDecrypt,
            Command::Unseal { .. } => Operation::Unseal,
            Command::Hmac { .. } => Operation::Hmac,
            Command::GetCapability { .. } => Operation::GetCapability,
            Command::GetRandom { .. } => Operation::GetRandom,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Response {
    CreatePrimary {
        handle: Handle,
        public: PublicArea,
        name: Name,
    },
    Create {
        public: PublicArea,
        private: PrivateBlob,
    },
    Load {
        handle: Handle,
        name: Name,
    },
    ReadPublic {
        public: PublicArea,
        name: Name,
    },
    FlushContext,
    EvictControl,
    Hash {
        digest: Vec<u8>,
        validation: HashCheckTicket,
    },
    Sign {
        signature: Signature,
    },
    RsaDecrypt {
        message: Vec<u8>,
    },
    EncryptDecrypt {
        data: Vec<u8>,
        iv_out: Vec<u8>,
    },
    Unseal {
        data: Vec<u8>,
    },
    Hmac {
        tag: Vec<u8>,
    },
    Capability {
        data: CapabilityData,
    },
    Random {
        bytes: Vec<u8>,
    },
}
