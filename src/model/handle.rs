use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// 32-bit reference to an entity inside the module
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub const TRANSIENT_FIRST: u32 = 0x8000_0000;
    pub const TRANSIENT_LAST: u32 = 0x80FF_FFFF;
    pub const PERSISTENT_FIRST: u32 = 0x8100_0000;
    pub const PERSISTENT_LAST: u32 = 0x81FF_FFFF;

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn is_transient(self) -> bool {
        self.0 >= Self::TRANSIENT_FIRST && self.0 <= Self::TRANSIENT_LAST
    }

    pub const fn is_persistent(self) -> bool {
        self.0 >= Self::PERSISTENT_FIRST && self.0 <= Self::PERSISTENT_LAST
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#010x})", self.0)
    }
}

/// Root of key derivation, each with its own seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hierarchy {
    Owner,
    Endorsement,
    Platform,
    /// Seed is regenerated whenever the module restarts
    Null,
}

impl Hierarchy {
    pub const ALL: [Hierarchy; 4] = [
        Hierarchy::Owner,
        Hierarchy::Endorsement,
        Hierarchy::Platform,
        Hierarchy::Null,
    ];

    pub const fn handle(self) -> Handle {
        match self {
            Hierarchy::Owner => Handle(0x4000_0001),
            Hierarchy::Null => Handle(0x4000_0007),
            Hierarchy::Endorsement => Handle(0x4000_000B),
            Hierarchy::Platform => Handle(0x4000_000C),
        }
    }

    pub fn from_handle(handle: Handle) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.handle() == handle)
    }
}

impl fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hierarchy::Owner => "owner",
            Hierarchy::Endorsement => "endorsement",
            Hierarchy::Platform => "platform",
            Hierarchy::Null => "null",
        };
        f.write_str(name)
    }
}

/// Persistent slot in the owner-controlled range
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersistentHandle(Handle);

impl PersistentHandle {
    pub const OWNER_FIRST: u32 = 0x8100_0000;
    pub const OWNER_LAST: u32 = 0x817F_FFFF;
    pub const DEFAULT: u32 = 0x8100_0010;

    pub fn new(value: u32) -> Result<Self, HandleError> {
        if (Self::OWNER_FIRST..=Self::OWNER_LAST).contains(&value) {
            Ok(Self(Handle(value)))
        } else {
            Err(HandleError::OutOfRange { value })
        }
    }

    pub fn default_slot() -> Self {
        Self(Handle(Self::DEFAULT))
    }

    pub const fn handle(self) -> Handle {
        self.0
    }
}

impl TryFrom<u32> for PersistentHandle {
    type Error = HandleError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for PersistentHandle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(digits) => u32::from_str_radix(digits, 16),
            None => trimmed.parse::<u32>(),
        };
        let value = parsed.map_err(|_| HandleError::Parse {
            input: s.to_string(),
        })?;
        Self::new(value)
    }
}

impl fmt::Display for PersistentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for PersistentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PersistentHandle({})", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error(
        "Handle {value:#010x} is outside the persistent range {first:#010x}..={last:#010x}",
        first = PersistentHandle::OWNER_FIRST,
        last = PersistentHandle::OWNER_LAST
    )]
    OutOfRange { value: u32 },

    #[error("Cannot parse handle from '{input}'")]
    Parse { input: String },
}
