//! Module configuration and default file names

use std::path::{Path, PathBuf};

pub const DEFAULT_KEY_FILE: &str = "key.tpm";
pub const DEFAULT_SEALED_FILE: &str = "sealed_key.tpm";
pub const DEFAULT_ENCRYPTED_FILE: &str = "blob.enc";
pub const DEFAULT_SIGNATURE_FILE: &str = "message.sig";
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "public.pem";

/// Files read from disk or stdin are capped at this size.
pub const MAX_INPUT_SIZE: u64 = 5 * 1024 * 1024;

/// Environment variable naming the software module's state directory
pub const STATE_DIR_ENV: &str = "TPMKEYS_STATE_DIR";

/// How the software module is instantiated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Where seeds and persistent objects live; `None` keeps everything in memory.
    pub state_dir: Option<PathBuf>,
    pub transient_slots: usize,
    pub persistent_slots: usize,
}

impl ModuleConfig {
    pub const DEFAULT_TRANSIENT_SLOTS: usize = 3;
    pub const DEFAULT_PERSISTENT_SLOTS: usize = 16;

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_state_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: Some(dir.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn transient_slots(mut self, slots: usize) -> Self {
        self.transient_slots = slots;
        self
    }

    pub fn persistent_slots(mut self, slots: usize) -> Self {
        self.persistent_slots = slots;
        self
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            transient_slots: Self::DEFAULT_TRANSIENT_SLOTS,
            persistent_slots: Self::DEFAULT_PERSISTENT_SLOTS,
        }
    }
}

/// State directory used when neither the flag nor the environment sets one
pub fn default_state_dir() -> PathBuf {
    std::env::temp_dir().join("tpmkeys-state")
}
