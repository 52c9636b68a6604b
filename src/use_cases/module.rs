use crate::error::TpmKeysResult;
use crate::model::{Handle, HashAlg, Hierarchy};
use crate::ports::{ModuleOpener, ModuleProperties};
use crate::session::with_session;

/// Module properties plus the persistent handles currently in use
pub fn module_info<O: ModuleOpener>(opener: &O) -> TpmKeysResult<(ModuleProperties, Vec<Handle>)> {
    with_session(opener, |session| {
        Ok((session.properties()?, session.persistent_handles()?))
    })
}

/// HMAC of `data` under the owner hierarchy's HMAC primary for `hash`
pub fn hmac_data<O: ModuleOpener>(opener: &O, hash: HashAlg, data: &[u8]) -> TpmKeysResult<Vec<u8>> {
    with_session(opener, |session| session.hmac(Hierarchy::Owner, hash, data))
}
