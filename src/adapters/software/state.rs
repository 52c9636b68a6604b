//! Module state shared by every connection: hierarchy secrets and persistent objects

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::objects::{Object, Sensitive};
use crate::codec::{marshal_public, unmarshal_public};
use crate::error::{TpmKeysError, TpmKeysResult};
use crate::files;
use crate::model::{Handle, Hierarchy};

const STATE_FILE: &str = "module-state.json";
const STATE_VERSION: u32 = 1;

/// Seed for primary derivation and proof for ticket HMACs
struct HierarchySecrets {
    seed: Zeroizing<[u8; 32]>,
    proof: Zeroizing<[u8; 32]>,
}

impl HierarchySecrets {
    fn random() -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        let mut proof = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut seed[..]);
        OsRng.fill_bytes(&mut proof[..]);
        Self { seed, proof }
    }

    fn from_saved(saved: &SavedHierarchy) -> Option<Self> {
        let seed: [u8; 32] = saved.seed.as_slice().try_into().ok()?;
        let proof: [u8; 32] = saved.proof.as_slice().try_into().ok()?;
        Some(Self {
            seed: Zeroizing::new(seed),
            proof: Zeroizing::new(proof),
        })
    }

    fn to_saved(&self) -> SavedHierarchy {
        SavedHierarchy {
            seed: self.seed.to_vec(),
            proof: self.proof.to_vec(),
        }
    }
}

pub(super) struct ModuleState {
    owner: HierarchySecrets,
    endorsement: HierarchySecrets,
    platform: HierarchySecrets,
    /// Never saved; a restart yields a fresh null hierarchy.
    null: HierarchySecrets,
    pub persistent: BTreeMap<u32, Object>,
    pub persistent_capacity: usize,
    state_file: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,
    owner: SavedHierarchy,
    endorsement: SavedHierarchy,
    platform: SavedHierarchy,
    persistent: Vec<SavedObject>,
}

#[derive(Serialize, Deserialize)]
struct SavedHierarchy {
    #[serde(with = "hex")]
    seed: Vec<u8>,
    #[serde(with = "hex")]
    proof: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct SavedObject {
    handle: u32,
    hierarchy: u32,
    #[serde(with = "hex")]
    public: Vec<u8>,
    #[serde(with = "hex")]
    sensitive: Vec<u8>,
}

impl ModuleState {
    pub fn in_memory(persistent_capacity: usize) -> Self {
        Self {
            owner: HierarchySecrets::random(),
            endorsement: HierarchySecrets::random(),
            platform: HierarchySecrets::random(),
            null: HierarchySecrets::random(),
            persistent: BTreeMap::new(),
            persistent_capacity,
            state_file: None,
        }
    }

    /// Restores state from `dir`, creating fresh seeds on first use.
    pub fn open(dir: &Path, persistent_capacity: usize) -> TpmKeysResult<Self> {
        let state_file = dir.join(STATE_FILE);
        if !state_file.exists() {
            fs::create_dir_all(dir).map_err(|source| TpmKeysError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let state = Self {
                state_file: Some(state_file),
                ..Self::in_memory(persistent_capacity)
            };
            state.save().map_err(unavailable)?;
            info!(dir = %dir.display(), "initialized software module state");
            return Ok(state);
        }

        let bytes = files::read_input(&state_file)?;
        let saved: StateFile = serde_json::from_slice(&bytes)
            .map_err(|e| unavailable(format!("corrupt state file: {e}")))?;
        if saved.version != STATE_VERSION {
            return Err(unavailable(format!(
                "state file version {} is not supported",
                saved.version
            )));
        }

        let secrets = |saved: &SavedHierarchy| {
            HierarchySecrets::from_saved(saved)
                .ok_or_else(|| unavailable("corrupt hierarchy secrets".to_string()))
        };
        let mut persistent = BTreeMap::new();
        for object in &saved.persistent {
            persistent.insert(object.handle, restore_object(object)?);
        }
        debug!(objects = persistent.len(), "restored software module state");

        Ok(Self {
            owner: secrets(&saved.owner)?,
            endorsement: secrets(&saved.endorsement)?,
            platform: secrets(&saved.platform)?,
            null: HierarchySecrets::random(),
            persistent,
            persistent_capacity,
            state_file: Some(state_file),
        })
    }

    /// Deletes the saved state so the next open starts with fresh seeds.
    pub fn reset(dir: &Path) -> TpmKeysResult<bool> {
        let state_file = dir.join(STATE_FILE);
        if state_file.exists() {
            files::remove(&state_file)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn secrets(&self, hierarchy: Hierarchy) -> &HierarchySecrets {
        match hierarchy {
            Hierarchy::Owner => &self.owner,
            Hierarchy::Endorsement => &self.endorsement,
            Hierarchy::Platform => &self.platform,
            Hierarchy::Null => &self.null,
        }
    }

    pub fn seed(&self, hierarchy: Hierarchy) -> &[u8] {
        &self.secrets(hierarchy).seed[..]
    }

    pub fn proof(&self, hierarchy: Hierarchy) -> &[u8] {
        &self.secrets(hierarchy).proof[..]
    }

    /// Writes seeds and persistent objects; a no-op for in-memory modules.
    pub fn save(&self) -> Result<(), String> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        let saved = StateFile {
            version: STATE_VERSION,
            owner: self.owner.to_saved(),
            endorsement: self.endorsement.to_saved(),
            platform: self.platform.to_saved(),
            persistent: self
                .persistent
                .iter()
                .map(|(handle, object)| SavedObject {
                    handle: *handle,
                    hierarchy: object.hierarchy.handle().value(),
                    public: marshal_public(&object.public),
                    sensitive: object.sensitive.marshal().to_vec(),
                })
                .collect(),
        };
        let json = Zeroizing::new(serde_json::to_vec_pretty(&saved).map_err(|e| e.to_string())?);
        let staging = path.with_extension("json.tmp");
        files::write_secret(&staging, &json).map_err(|e| e.to_string())?;
        fs::rename(&staging, path).map_err(|e| format!("{}: {e}", path.display()))
    }
}

fn restore_object(saved: &SavedObject) -> TpmKeysResult<Object> {
    let public = unmarshal_public(&saved.public)
        .map_err(|e| unavailable(format!("persistent object {:#010x}: {e}", saved.handle)))?;
    let sensitive = Sensitive::unmarshal(&saved.sensitive)
        .map_err(|e| unavailable(format!("persistent object {:#010x}: {e}", saved.handle)))?;
    let hierarchy = Hierarchy::from_handle(Handle::new(saved.hierarchy))
        .ok_or_else(|| unavailable(format!("unknown hierarchy {:#010x}", saved.hierarchy)))?;
    let name = public.name()?;
    Ok(Object {
        public,
        name,
        sensitive,
        hierarchy,
    })
}

fn unavailable(reason: String) -> TpmKeysError {
    TpmKeysError::ModuleUnavailable { reason }
}
