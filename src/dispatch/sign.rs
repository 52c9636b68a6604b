//! Signing, including the hash-check ticket protocol for restricted keys
//!
//! A restricted signing key only signs digests the module computed itself.
//! For such a key the message is hashed by the module, which returns the
//! digest together with a ticket proving where it came from. Unrestricted
//! keys get a locally computed digest and the null ticket.

use tracing::debug;

use super::not_permitted;
use crate::error::{TpmKeysError, TpmKeysResult};
use crate::model::{
    EccParams, EccScheme, HashAlg, HashCheckTicket, Hierarchy, KeyParams, PublicArea, RsaParams,
    RsaScheme, SigScheme, Signature,
};
use crate::ports::{Command, Operation, Response, Transport, MAX_BUFFER};
use crate::session::{unexpected, ObjectRef, Session};

/// Hierarchy whose proof backs the tickets this crate asks for
const TICKET_HIERARCHY: Hierarchy = Hierarchy::Owner;

impl<T: Transport> Session<T> {
    /// Signs `message` with `key`.
    ///
    /// The key's public area is read back from the module first; its
    /// `restricted` attribute decides whether the module or the host hashes
    /// the message.
    ///
    /// # Errors
    ///
    /// [`TpmKeysError::PayloadTooLarge`] when a restricted key is asked to
    /// sign more than the module hashes in one pass,
    /// [`TpmKeysError::AuthorizationDenied`] when the module refuses the
    /// ticket or the key cannot sign.
    pub fn sign(&self, key: &impl ObjectRef, message: &[u8]) -> TpmKeysResult<Signature> {
        let (public, name) = self.read_public(key.handle())?;
        if &name != key.name() {
            return Err(TpmKeysError::IdentityMismatch {
                handle: key.handle(),
                expected: key.name().clone(),
                actual: name,
            });
        }
        if !public.attributes().can_sign() {
            return Err(not_permitted(
                Operation::Sign,
                key,
                "object attributes do not permit signing",
            ));
        }
        let (hash, scheme) = signing_scheme(&public).ok_or_else(|| {
            not_permitted(
                Operation::Sign,
                key,
                &format!("{} objects cannot produce signatures", public.object_type()),
            )
        })?;

        let (digest, ticket) = if public.is_restricted() {
            if message.len() > MAX_BUFFER {
                return Err(TpmKeysError::PayloadTooLarge {
                    size: message.len(),
                    max: MAX_BUFFER,
                });
            }
            self.hash(message, hash, TICKET_HIERARCHY)?
        } else {
            (hash.digest(message)?, HashCheckTicket::null())
        };
        debug!(
            handle = %key.handle(),
            restricted = public.is_restricted(),
            %hash,
            "signing digest"
        );
        self.sign_digest(key, &digest, ticket, scheme)
    }

    /// Signs a digest as given. Restricted keys need `ticket` from [`Session::hash`].
    pub fn sign_digest(
        &self,
        key: &impl ObjectRef,
        digest: &[u8],
        ticket: HashCheckTicket,
        scheme: Option<SigScheme>,
    ) -> TpmKeysResult<Signature> {
        let response = self.run(
            Command::Sign {
                key: key.auth_handle(),
                digest: digest.to_vec(),
                scheme,
                validation: ticket,
            },
            key.handle(),
        )?;
        match response {
            Response::Sign { signature } => Ok(signature),
            _ => Err(unexpected(Operation::Sign)),
        }
    }

    /// Hashes `data` inside the module, returning the digest and its ticket.
    ///
    /// The ticket is null for the null hierarchy and for data the module
    /// refuses to vouch for.
    pub fn hash(
        &self,
        data: &[u8],
        hash_alg: HashAlg,
        hierarchy: Hierarchy,
    ) -> TpmKeysResult<(Vec<u8>, HashCheckTicket)> {
        if data.len() > MAX_BUFFER {
            return Err(TpmKeysError::PayloadTooLarge {
                size: data.len(),
                max: MAX_BUFFER,
            });
        }
        let response = self.run(
            Command::Hash {
                data: data.to_vec(),
                hash_alg,
                hierarchy,
            },
            hierarchy.handle(),
        )?;
        match response {
            Response::Hash { digest, validation } => Ok((digest, validation)),
            _ => Err(unexpected(Operation::Hash)),
        }
    }
}

/// Digest to sign with, plus the scheme to request when the key has none.
fn signing_scheme(public: &PublicArea) -> Option<(HashAlg, Option<SigScheme>)> {
    match public.params() {
        KeyParams::Ecc(EccParams {
            scheme: Some(EccScheme::Ecdsa(hash)),
            ..
        })
        | KeyParams::Rsa(RsaParams {
            scheme: Some(RsaScheme::RsaSsa(hash)),
            ..
        }) => Some((*hash, None)),
        KeyParams::Ecc(EccParams { scheme: None, .. }) => {
            Some((HashAlg::Sha256, Some(SigScheme::Ecdsa(HashAlg::Sha256))))
        }
        KeyParams::Rsa(RsaParams { scheme: None, .. }) => {
            Some((HashAlg::Sha256, Some(SigScheme::RsaSsa(HashAlg::Sha256))))
        }
        _ => None,
    }
}
