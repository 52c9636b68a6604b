//! In-process security module
//!
//! [`SoftwareModule`] owns the hierarchy secrets and persistent objects and
//! hands out [`SoftwareConnection`]s. Each connection has its own pool of
//! transient slots, so objects loaded by one session are invisible to
//! another and disappear when the connection closes.

mod crypto;
mod objects;
mod state;

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use zeroize::Zeroizing;

use self::objects::Object;
use self::state::ModuleState;
use crate::codec::marshal_public;
use crate::config::ModuleConfig;
use crate::error::TpmKeysResult;
use crate::model::{
    EccParams, EccScheme, Handle, HashAlg, HashCheckTicket, Hierarchy, KeyParams,
    KeyTemplate, KeyedHashParams, KeyedHashScheme, ObjectAttributes, ObjectType,
    PersistentHandle, PrivateBlob, PublicArea, RsaParams, RsaScheme, SensitiveCreate, SigScheme,
    Signature, SymMode, TemplateError, MAX_SEALED_DATA,
};
use crate::ports::{
    AuthHandle, Capability, CapabilityData, Command, ModuleFault, ModuleOpener, ModuleProperties,
    NamedHandle, Response, ResponseCode, Transport, MAX_BUFFER, MAX_RANDOM_BYTES,
};

const PRIMARY_LABEL: &[u8] = b"PRIMARY";
/// Digest of the HMAC that makes up a hash-check ticket
const TICKET_HASH: HashAlg = HashAlg::Sha256;
/// Messages starting with this value are never given a ticket.
const GENERATED_VALUE: [u8; 4] = [0xFF, 0x54, 0x43, 0x47];
const CFB_IV_SIZE: usize = 16;

/// Software security module shared by every connection opened on it
#[derive(Clone)]
pub struct SoftwareModule {
    shared: Arc<Mutex<ModuleState>>,
    transient_slots: usize,
}

impl SoftwareModule {
    /// Opens the module described by `config`, restoring saved state when it
    /// names a state directory.
    pub fn open(config: &ModuleConfig) -> TpmKeysResult<Self> {
        let state = match &config.state_dir {
            Some(dir) => ModuleState::open(dir, config.persistent_slots)?,
            None => ModuleState::in_memory(config.persistent_slots),
        };
        Ok(Self {
            shared: Arc::new(Mutex::new(state)),
            transient_slots: config.transient_slots,
        })
    }

    /// Fresh module with random seeds and nothing persisted
    pub fn in_memory() -> Self {
        let config = ModuleConfig::in_memory();
        Self {
            shared: Arc::new(Mutex::new(ModuleState::in_memory(config.persistent_slots))),
            transient_slots: config.transient_slots,
        }
    }

    pub fn connect(&self) -> SoftwareConnection {
        SoftwareConnection {
            shared: Arc::clone(&self.shared),
            slots: (0..self.transient_slots).map(|_| None).collect(),
            open: true,
        }
    }

    /// Discards saved seeds and persistent objects. Returns whether anything
    /// was deleted.
    pub fn reset(config: &ModuleConfig) -> TpmKeysResult<bool> {
        match &config.state_dir {
            Some(dir) => ModuleState::reset(dir),
            None => Ok(false),
        }
    }
}

impl ModuleOpener for SoftwareModule {
    type Transport = SoftwareConnection;

    fn open(&self) -> TpmKeysResult<SoftwareConnection> {
        Ok(self.connect())
    }
}

/// One session's command channel to a [`SoftwareModule`]
pub struct SoftwareConnection {
    shared: Arc<Mutex<ModuleState>>,
    slots: Vec<Option<Object>>,
    open: bool,
}

impl Transport for SoftwareConnection {
    fn execute(&mut self, command: Command) -> Result<Response, ModuleFault> {
        if !self.open {
            return Err(ModuleFault::Transport {
                reason: "connection is closed".to_string(),
            });
        }
        let operation = command.operation();
        debug!(%operation, "executing command");

        let result = match command {
            Command::CreatePrimary {
                hierarchy,
                template,
                sensitive,
            } => self.create_primary(hierarchy, &template, &sensitive),
            Command::Create {
                parent,
                template,
                sensitive,
            } => self.create(&parent, &template, &sensitive),
            Command::Load {
                parent,
                public,
                private,
            } => self.load(&parent, public, &private),
            Command::ReadPublic { handle } => self.read_public(handle),
            Command::FlushContext { handle } => self.flush(handle),
            Command::EvictControl {
                auth,
                object,
                persistent,
            } => self.evict_control(auth, &object, persistent),
            Command::Hash {
                data,
                hash_alg,
                hierarchy,
            } => self.hash(&data, hash_alg, hierarchy),
            Command::Sign {
                key,
                digest,
                scheme,
                validation,
            } => self.sign(&key, &digest, scheme, &validation),
            Command::RsaDecrypt {
                key,
                ciphertext,
                oaep_hash,
            } => self.rsa_decrypt(&key, &ciphertext, oaep_hash),
            Command::EncryptDecrypt {
                key,
                decrypt,
                mode,
                iv,
                data,
            } => self.encrypt_decrypt(&key, decrypt, mode, &iv, data),
            Command::Unseal { item } => self.unseal(&item),
            Command::Hmac { key, data } => self.hmac(&key, &data),
            Command::GetCapability { capability } => Ok(self.capability(capability)),
            Command::GetRandom { bytes_requested } => Ok(random(bytes_requested)),
        };

        if let Err(fault) = &result {
            debug!(%operation, %fault, "command failed");
        }
        result
    }

    fn close(&mut self) -> Result<(), ModuleFault> {
        let loaded = self.slots.iter().filter(|slot| slot.is_some()).count();
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.open = false;
        debug!(loaded, "connection closed, transient objects released");
        Ok(())
    }
}

impl SoftwareConnection {
    fn object(&self, handle: Handle) -> Result<Object, ResponseCode> {
        if handle.is_transient() {
            let index = (handle.value() - Handle::TRANSIENT_FIRST) as usize;
            self.slots
                .get(index)
                .and_then(Option::as_ref)
                .cloned()
                .ok_or(ResponseCode::Handle)
        } else if handle.is_persistent() {
            self.shared
                .lock()
                .persistent
                .get(&handle.value())
                .cloned()
                .ok_or(ResponseCode::Handle)
        } else {
            Err(ResponseCode::Handle)
        }
    }

    /// Resolves `key` and checks both its name and its password.
    fn authorize(&self, key: &AuthHandle) -> Result<Object, ResponseCode> {
        let object = self.object(key.handle)?;
        if object.name != key.name {
            return Err(ResponseCode::BadAuth);
        }
        if !object
            .public
            .attributes()
            .contains(ObjectAttributes::USER_WITH_AUTH)
        {
            return Err(ResponseCode::AuthUnavailable);
        }
        if !bool::from(object.sensitive.auth.as_slice().ct_eq(key.auth.as_bytes())) {
            return Err(ResponseCode::BadAuth);
        }
        Ok(object)
    }

    fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    fn allocate(&mut self, object: Object) -> Result<Handle, ResponseCode> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ResponseCode::ObjectMemory)?;
        self.slots[index] = Some(object);
        Ok(Handle::new(Handle::TRANSIENT_FIRST + index as u32))
    }

    fn create_primary(
        &mut self,
        hierarchy: Hierarchy,
        template: &PublicArea,
        sensitive: &SensitiveCreate,
    ) -> Result<Response, ModuleFault> {
        let template = template.template();
        check_template(template, sensitive)?;
        if !self.has_free_slot() {
            return Err(ResponseCode::ObjectMemory.into());
        }

        let mut seed = Zeroizing::new([0u8; 32]);
        crypto::kdf(
            self.shared.lock().seed(hierarchy),
            PRIMARY_LABEL,
            &[
                marshal_public(&template.to_public()).as_slice(),
                sensitive.data(),
            ],
            &mut seed[..],
        )?;
        let mut rng = ChaCha20Rng::from_seed(*seed);
        let (public, secrets) = objects::generate(template, sensitive, &mut rng)?;
        let name = public.name().map_err(|_| ResponseCode::Hash)?;

        let handle = self.allocate(Object {
            public: public.clone(),
            name: name.clone(),
            sensitive: secrets,
            hierarchy,
        })?;
        debug!(%hierarchy, %handle, %name, "primary object created");
        Ok(Response::CreatePrimary {
            handle,
            public,
            name,
        })
    }

    fn create(
        &mut self,
        parent: &AuthHandle,
        template: &PublicArea,
        sensitive: &SensitiveCreate,
    ) -> Result<Response, ModuleFault> {
        let parent = self.authorize(parent)?;
        if !parent.public.is_storage_parent() {
            return Err(ResponseCode::Type.into());
        }
        let template = template.template();
        check_template(template, sensitive)?;

        let (public, secrets) = objects::generate(template, sensitive, &mut OsRng)?;
        let name = public.name().map_err(|_| ResponseCode::Hash)?;
        let private = objects::wrap(&parent, &name, &secrets)?;
        Ok(Response::Create { public, private })
    }

    fn load(
        &mut self,
        parent: &AuthHandle,
        public: PublicArea,
        private: &PrivateBlob,
    ) -> Result<Response, ModuleFault> {
        let parent = self.authorize(parent)?;
        if !parent.public.is_storage_parent() {
            return Err(ResponseCode::Type.into());
        }
        public
            .template()
            .validate()
            .map_err(|err| template_code(public.template(), err))?;
        if !self.has_free_slot() {
            return Err(ResponseCode::ObjectMemory.into());
        }

        let name = public.name().map_err(|_| ResponseCode::Hash)?;
        let sensitive = objects::unwrap(&parent, &public, &name, private)?;
        let handle = self.allocate(Object {
            public,
            name: name.clone(),
            sensitive,
            hierarchy: parent.hierarchy,
        })?;
        Ok(Response::Load { handle, name })
    }

    fn read_public(&self, handle: Handle) -> Result<Response, ModuleFault> {
        let object = self.object(handle)?;
        Ok(Response::ReadPublic {
            public: object.public,
            name: object.name,
        })
    }

    fn flush(&mut self, handle: Handle) -> Result<Response, ModuleFault> {
        if !handle.is_transient() {
            return Err(ResponseCode::Handle.into());
        }
        let index = (handle.value() - Handle::TRANSIENT_FIRST) as usize;
        match self.slots.get_mut(index).and_then(Option::take) {
            Some(_) => Ok(Response::FlushContext),
            None => Err(ResponseCode::Handle.into()),
        }
    }

    fn evict_control(
        &mut self,
        auth: Hierarchy,
        object: &NamedHandle,
        persistent: Handle,
    ) -> Result<Response, ModuleFault> {
        if !matches!(auth, Hierarchy::Owner | Hierarchy::Platform) {
            return Err(ResponseCode::Hierarchy.into());
        }
        if !(PersistentHandle::OWNER_FIRST..=PersistentHandle::OWNER_LAST)
            .contains(&persistent.value())
        {
            return Err(ResponseCode::Range.into());
        }

        if object.handle.is_persistent() {
            if object.handle != persistent {
                return Err(ResponseCode::Handle.into());
            }
            let mut state = self.shared.lock();
            match state.persistent.get(&persistent.value()) {
                None => return Err(ResponseCode::Handle.into()),
                Some(existing) if existing.name != object.name => {
                    return Err(ResponseCode::BadAuth.into())
                }
                Some(_) => {}
            }
            let evicted = state.persistent.remove(&persistent.value());
            if let Err(reason) = state.save() {
                if let Some(evicted) = evicted {
                    state.persistent.insert(persistent.value(), evicted);
                }
                return Err(ModuleFault::Transport { reason });
            }
            info!(%persistent, "persistent object evicted");
            return Ok(Response::EvictControl);
        }

        let loaded = self.object(object.handle)?;
        if loaded.name != object.name {
            return Err(ResponseCode::BadAuth.into());
        }
        if loaded.hierarchy == Hierarchy::Null {
            return Err(ResponseCode::Hierarchy.into());
        }
        if loaded
            .public
            .attributes()
            .contains(ObjectAttributes::ST_CLEAR)
        {
            return Err(ResponseCode::Attributes.into());
        }

        let mut state = self.shared.lock();
        if state.persistent.contains_key(&persistent.value()) {
            return Err(ResponseCode::NvDefined.into());
        }
        if state.persistent.len() >= state.persistent_capacity {
            return Err(ResponseCode::NvSpace.into());
        }
        state.persistent.insert(persistent.value(), loaded);
        if let Err(reason) = state.save() {
            state.persistent.remove(&persistent.value());
            return Err(ModuleFault::Transport { reason });
        }
        info!(%persistent, name = %object.name, "object persisted");
        Ok(Response::EvictControl)
    }

    fn hash(
        &self,
        data: &[u8],
        hash_alg: HashAlg,
        hierarchy: Hierarchy,
    ) -> Result<Response, ModuleFault> {
        if data.len() > MAX_BUFFER {
            return Err(ResponseCode::Size.into());
        }
        let digest = hash_alg.digest(data).map_err(|_| ResponseCode::Hash)?;
        let validation = if hierarchy == Hierarchy::Null || data.starts_with(&GENERATED_VALUE) {
            HashCheckTicket::null()
        } else {
            let tag = crypto::hmac(
                TICKET_HASH,
                self.shared.lock().proof(hierarchy),
                &[&HashCheckTicket::TAG.to_be_bytes()[..], digest.as_slice()],
            )?;
            HashCheckTicket::new(hierarchy, tag)
        };
        Ok(Response::Hash { digest, validation })
    }

    fn check_ticket(&self, digest: &[u8], ticket: &HashCheckTicket) -> Result<(), ResponseCode> {
        if ticket.is_null() || ticket.hierarchy() == Hierarchy::Null {
            return Err(ResponseCode::Ticket);
        }
        let valid = crypto::hmac_matches(
            TICKET_HASH,
            self.shared.lock().proof(ticket.hierarchy()),
            &[&HashCheckTicket::TAG.to_be_bytes()[..], digest],
            ticket.digest(),
        )?;
        if valid {
            Ok(())
        } else {
            Err(ResponseCode::Ticket)
        }
    }

    fn sign(
        &self,
        key: &AuthHandle,
        digest: &[u8],
        requested: Option<SigScheme>,
        validation: &HashCheckTicket,
    ) -> Result<Response, ModuleFault> {
        let object = self.authorize(key)?;
        let attrs = object.public.attributes();
        if !attrs.can_sign() {
            return Err(ResponseCode::Attributes.into());
        }
        let scheme = resolve_scheme(object.public.params(), requested)?;
        if digest.len() != scheme.hash().digest_size() {
            return Err(ResponseCode::Size.into());
        }
        if attrs.is_restricted() {
            self.check_ticket(digest, validation)?;
        }

        let material = &object.sensitive.material;
        let signature = match scheme {
            SigScheme::Ecdsa(hash) => {
                let (r, s) = crypto::ecdsa_sign(material, digest)?;
                Signature::Ecdsa { hash, r, s }
            }
            SigScheme::RsaSsa(hash) => Signature::RsaSsa {
                hash,
                sig: crypto::rsa_sign(material, hash, digest)?,
            },
        };
        Ok(Response::Sign { signature })
    }

    fn rsa_decrypt(
        &self,
        key: &AuthHandle,
        ciphertext: &[u8],
        oaep_hash: HashAlg,
    ) -> Result<Response, ModuleFault> {
        let object = self.authorize(key)?;
        let KeyParams::Rsa(params) = *object.public.params() else {
            return Err(ResponseCode::Type.into());
        };
        let attrs = object.public.attributes();
        if !attrs.can_decrypt() || attrs.is_restricted() {
            return Err(ResponseCode::Attributes.into());
        }
        match params.scheme {
            Some(RsaScheme::Oaep(hash)) if hash != oaep_hash => {
                return Err(ResponseCode::Scheme.into())
            }
            Some(RsaScheme::RsaSsa(_)) => return Err(ResponseCode::Scheme.into()),
            _ => {}
        }
        let message = crypto::rsa_oaep_decrypt(&object.sensitive.material, oaep_hash, ciphertext)?;
        Ok(Response::RsaDecrypt { message })
    }

    fn encrypt_decrypt(
        &self,
        key: &AuthHandle,
        decrypt: bool,
        mode: SymMode,
        iv: &[u8],
        data: Vec<u8>,
    ) -> Result<Response, ModuleFault> {
        let object = self.authorize(key)?;
        let KeyParams::SymCipher(def) = *object.public.params() else {
            return Err(ResponseCode::Type.into());
        };
        let attrs = object.public.attributes();
        let permitted = if decrypt {
            attrs.can_decrypt()
        } else {
            attrs.can_sign()
        };
        if attrs.is_restricted() || !permitted {
            return Err(ResponseCode::Attributes.into());
        }
        if mode != def.mode || mode != SymMode::Cfb {
            return Err(ResponseCode::Mode.into());
        }
        if iv.len() != CFB_IV_SIZE || data.len() > MAX_BUFFER {
            return Err(ResponseCode::Size.into());
        }

        let mut output = data.clone();
        crypto::aes_cfb(&object.sensitive.material, iv, &mut output, decrypt)?;

        // The next IV is the last ciphertext block of iv ‖ ciphertext.
        let ciphertext = if decrypt { &data } else { &output };
        let mut chain = iv.to_vec();
        chain.extend_from_slice(ciphertext);
        let iv_out = chain[chain.len() - CFB_IV_SIZE..].to_vec();

        Ok(Response::EncryptDecrypt {
            data: output,
            iv_out,
        })
    }

    fn unseal(&self, item: &AuthHandle) -> Result<Response, ModuleFault> {
        let object = self.authorize(item)?;
        if !object.public.is_sealed_data() {
            return Err(ResponseCode::Type.into());
        }
        Ok(Response::Unseal {
            data: object.sensitive.material.clone(),
        })
    }

    fn hmac(&self, key: &AuthHandle, data: &[u8]) -> Result<Response, ModuleFault> {
        let object = self.authorize(key)?;
        let KeyParams::KeyedHash(KeyedHashParams {
            scheme: Some(KeyedHashScheme::Hmac(hash)),
        }) = *object.public.params()
        else {
            return Err(ResponseCode::Type.into());
        };
        let attrs = object.public.attributes();
        if !attrs.can_sign() || attrs.is_restricted() {
            return Err(ResponseCode::Attributes.into());
        }
        if data.len() > MAX_BUFFER {
            return Err(ResponseCode::Size.into());
        }
        let tag = crypto::hmac(hash, &object.sensitive.material, &[data])?;
        Ok(Response::Hmac { tag })
    }

    fn capability(&self, capability: Capability) -> Response {
        let state = self.shared.lock();
        let data = match capability {
            Capability::Handles { first, max } => {
                let transient = self
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_some())
                    .map(|(index, _)| Handle::TRANSIENT_FIRST + index as u32);
                let persistent = state.persistent.keys().copied();
                let mut handles: Vec<Handle> = transient
                    .chain(persistent)
                    .filter(|value| *value >= first.value())
                    .map(Handle::new)
                    .collect();
                handles.sort();
                handles.truncate(max as usize);
                CapabilityData::Handles(handles)
            }
            Capability::Properties => CapabilityData::Properties(ModuleProperties {
                family: "2.0".to_string(),
                manufacturer: "tpmkeys software module".to_string(),
                firmware_version: env!("CARGO_PKG_VERSION").to_string(),
                transient_slots: self.slots.len() as u32,
                persistent_slots: state.persistent_capacity as u32,
                persistent_loaded: state.persistent.len() as u32,
            }),
        };
        Response::Capability { data }
    }
}

fn random(bytes_requested: u16) -> Response {
    let mut bytes = vec![0u8; usize::from(bytes_requested).min(MAX_RANDOM_BYTES)];
    OsRng.fill_bytes(&mut bytes);
    Response::Random { bytes }
}

/// Local template checks plus the limits on caller-supplied secrets.
fn check_template(template: &KeyTemplate, sensitive: &SensitiveCreate) -> Result<(), ResponseCode> {
    template
        .validate()
        .map_err(|err| template_code(template, err))?;
    if sensitive.user_auth().len() > template.name_alg.digest_size() {
        return Err(ResponseCode::Size);
    }
    if !sensitive.data().is_empty() {
        let takes_data = template.object_type() == ObjectType::KeyedHash
            && !template
                .attributes
                .contains(ObjectAttributes::SENSITIVE_DATA_ORIGIN);
        if !takes_data {
            return Err(ResponseCode::Attributes);
        }
        if sensitive.data().len() > MAX_SEALED_DATA {
            return Err(ResponseCode::Size);
        }
    }
    Ok(())
}

fn template_code(template: &KeyTemplate, err: TemplateError) -> ResponseCode {
    match err {
        TemplateError::StorageWithoutSymmetric => ResponseCode::Symmetric,
        TemplateError::StorageWithScheme | TemplateError::RestrictedSignerWithoutScheme => {
            ResponseCode::Scheme
        }
        TemplateError::UnsupportedExponent { .. } => ResponseCode::Value,
        TemplateError::AuthPolicySize { .. } | TemplateError::BufferTooLarge { .. } => {
            ResponseCode::Size
        }
        TemplateError::UniqueMismatch { .. } => ResponseCode::Type,
        TemplateError::Algorithm(_) => {
            let hashes_ok = template.name_alg.is_implemented()
                && template
                    .params
                    .scheme_hash()
                    .map_or(true, HashAlg::is_implemented);
            match (hashes_ok, template.object_type()) {
                (false, _) => ResponseCode::Hash,
                (true, ObjectType::Ecc) => ResponseCode::Curve,
                (true, _) => ResponseCode::KeySize,
            }
        }
        _ => ResponseCode::Attributes,
    }
}

/// The key's own scheme wins; a requested scheme must agree with it or
/// stand in for a key that has none.
fn resolve_scheme(
    params: &KeyParams,
    requested: Option<SigScheme>,
) -> Result<SigScheme, ResponseCode> {
    let own = match params {
        KeyParams::Ecc(EccParams {
            scheme: Some(EccScheme::Ecdsa(hash)),
            ..
        }) => Some(SigScheme::Ecdsa(*hash)),
        KeyParams::Rsa(RsaParams {
            scheme: Some(RsaScheme::RsaSsa(hash)),
            ..
        }) => Some(SigScheme::RsaSsa(*hash)),
        KeyParams::Rsa(RsaParams {
            scheme: Some(RsaScheme::Oaep(_)),
            ..
        }) => return Err(ResponseCode::Scheme),
        KeyParams::Ecc(_) | KeyParams::Rsa(_) => None,
        KeyParams::SymCipher(_) | KeyParams::KeyedHash(_) => return Err(ResponseCode::Type),
    };
    let scheme = match (own, requested) {
        (Some(own), None) => own,
        (Some(own), Some(requested)) if own == requested => own,
        (None, Some(requested)) => requested,
        _ => return Err(ResponseCode::Scheme),
    };
    let matches_key = matches!(
        (params, scheme),
        (KeyParams::Ecc(_), SigScheme::Ecdsa(_)) | (KeyParams::Rsa(_), SigScheme::RsaSsa(_))
    );
    if matches_key {
        Ok(scheme)
    } else {
        Err(ResponseCode::Scheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests_for;
    use crate::model::catalog;
    use crate::ports::contract_tests::transport_contract;

    contract_tests_for!(
        software_connection_contract,
        make = || SoftwareModule::in_memory().connect(),
        tests = {
            test_primary_is_reproducible => transport_contract::test_primary_is_reproducible,
            test_slot_exhaustion => transport_contract::test_slot_exhaustion,
            test_flush_frees_slot => transport_contract::test_flush_frees_slot,
            test_unknown_handle => transport_contract::test_unknown_handle,
            test_name_mismatch_is_bad_auth => transport_contract::test_name_mismatch_is_bad_auth,
            test_wrong_password_is_bad_auth => transport_contract::test_wrong_password_is_bad_auth,
            test_restricted_sign_needs_ticket => transport_contract::test_restricted_sign_needs_ticket,
            test_null_hierarchy_hash_has_no_ticket => transport_contract::test_null_hierarchy_hash_has_no_ticket,
            test_seal_limit => transport_contract::test_seal_limit,
            test_tampered_private_fails_integrity => transport_contract::test_tampered_private_fails_integrity,
            test_persistent_slot_occupied => transport_contract::test_persistent_slot_occupied,
            test_random_is_capped => transport_contract::test_random_is_capped,
            test_closed_transport_fails => transport_contract::test_closed_transport_fails,
        }
    );

    fn primary(conn: &mut SoftwareConnection) -> (Handle, crate::model::Name) {
        match conn
            .execute(Command::CreatePrimary {
                hierarchy: Hierarchy::Owner,
                template: catalog::ecc_storage_parent().to_public(),
                sensitive: SensitiveCreate::default(),
            })
            .unwrap()
        {
            Response::CreatePrimary { handle, name, .. } => (handle, name),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_connections_do_not_share_transient_objects() {
        let module = SoftwareModule::in_memory();
        let mut first = module.connect();
        let mut second = module.connect();
        let (handle, _) = primary(&mut first);

        assert_eq!(
            second.execute(Command::ReadPublic { handle }).unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Handle)
        );
    }

    #[test]
    fn test_persistent_objects_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModuleConfig::with_state_dir(dir.path());
        let slot = Handle::new(PersistentHandle::DEFAULT);
        let name = {
            let module = SoftwareModule::open(&config).unwrap();
            let mut conn = module.connect();
            let (handle, name) = primary(&mut conn);
            conn.execute(Command::EvictControl {
                auth: Hierarchy::Owner,
                object: NamedHandle { handle, name: name.clone() },
                persistent: slot,
            })
            .unwrap();
            name
        };

        let module = SoftwareModule::open(&config).unwrap();
        match module.connect().execute(Command::ReadPublic { handle: slot }).unwrap() {
            Response::ReadPublic { name: read, .. } => assert_eq!(read, name),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_failed_save_leaves_slot_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModuleConfig::with_state_dir(dir.path());
        let slot = Handle::new(PersistentHandle::DEFAULT);
        let module = SoftwareModule::open(&config).unwrap();
        let mut conn = module.connect();
        let (handle, name) = primary(&mut conn);

        let staging = dir.path().join("module-state.json.tmp");
        std::fs::create_dir(&staging).unwrap();
        let persist = Command::EvictControl {
            auth: Hierarchy::Owner,
            object: NamedHandle { handle, name: name.clone() },
            persistent: slot,
        };
        assert!(matches!(
            conn.execute(persist.clone()),
            Err(ModuleFault::Transport { .. })
        ));
        assert_eq!(
            conn.execute(Command::ReadPublic { handle: slot }).unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Handle)
        );

        std::fs::remove_dir(&staging).unwrap();
        conn.execute(persist).unwrap();

        std::fs::create_dir(&staging).unwrap();
        let evict = Command::EvictControl {
            auth: Hierarchy::Owner,
            object: NamedHandle { handle: slot, name: name.clone() },
            persistent: slot,
        };
        assert!(matches!(
            conn.execute(evict),
            Err(ModuleFault::Transport { .. })
        ));
        match conn.execute(Command::ReadPublic { handle: slot }).unwrap() {
            Response::ReadPublic { name: read, .. } => assert_eq!(read, name),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_owner_seed_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModuleConfig::with_state_dir(dir.path());
        let (_, first) = primary(&mut SoftwareModule::open(&config).unwrap().connect());
        let (_, second) = primary(&mut SoftwareModule::open(&config).unwrap().connect());
        assert_eq!(first, second);

        assert!(SoftwareModule::reset(&config).unwrap());
        let (_, third) = primary(&mut SoftwareModule::open(&config).unwrap().connect());
        assert_ne!(first, third);
    }

    #[test]
    fn test_null_hierarchy_objects_cannot_persist() {
        let mut conn = SoftwareModule::in_memory().connect();
        let Response::CreatePrimary { handle, name, .. } = conn
            .execute(Command::CreatePrimary {
                hierarchy: Hierarchy::Null,
                template: catalog::ecc_signer().to_public(),
                sensitive: SensitiveCreate::default(),
            })
            .unwrap()
        else {
            panic!("expected a primary");
        };
        assert_eq!(
            conn.execute(Command::EvictControl {
                auth: Hierarchy::Owner,
                object: NamedHandle { handle, name },
                persistent: Handle::new(PersistentHandle::DEFAULT),
            })
            .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Hierarchy)
        );
    }

    #[test]
    fn test_evict_outside_owner_range() {
        let mut conn = SoftwareModule::in_memory().connect();
        let (handle, name) = primary(&mut conn);
        assert_eq!(
            conn.execute(Command::EvictControl {
                auth: Hierarchy::Owner,
                object: NamedHandle { handle, name },
                persistent: Handle::new(0x8180_0000),
            })
            .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Range)
        );
    }

    #[test]
    fn test_scheme_resolution() {
        let ecc = *catalog::ecc_signer().to_public().params();
        assert_eq!(
            resolve_scheme(&ecc, None),
            Ok(SigScheme::Ecdsa(HashAlg::Sha256))
        );
        assert_eq!(
            resolve_scheme(&ecc, Some(SigScheme::Ecdsa(HashAlg::Sha384))),
            Err(ResponseCode::Scheme)
        );

        let rsa = *catalog::rsa_decrypt().to_public().params();
        assert_eq!(resolve_scheme(&rsa, None), Err(ResponseCode::Scheme));
        assert_eq!(
            resolve_scheme(&rsa, Some(SigScheme::RsaSsa(HashAlg::Sha256))),
            Ok(SigScheme::RsaSsa(HashAlg::Sha256))
        );
        assert_eq!(
            resolve_scheme(&rsa, Some(SigScheme::Ecdsa(HashAlg::Sha256))),
            Err(ResponseCode::Scheme)
        );
    }

    #[test]
    fn test_template_codes() {
        let mut storage = catalog::ecc_storage_parent();
        if let KeyParams::Ecc(params) = &mut storage.params {
            params.symmetric = None;
        }
        assert_eq!(
            check_template(&storage, &SensitiveCreate::default()),
            Err(ResponseCode::Symmetric)
        );

        let signer = catalog::ecc_signer();
        assert_eq!(
            check_template(&signer, &SensitiveCreate::with_data(b"x".to_vec())),
            Err(ResponseCode::Attributes)
        );

        let mut sm3 = catalog::ecc_signer();
        sm3.name_alg = HashAlg::Sm3_256;
        assert_eq!(
            check_template(&sm3, &SensitiveCreate::default()),
            Err(ResponseCode::Hash)
        );
    }
}
