//! Sessions and scoped module objects
//!
//! A [`Session`] wraps one transport. Commands on a session are strictly
//! serialized: the transport sits in a `RefCell`, so a second command issued
//! while one is in flight fails instead of interleaving.
//!
//! Every transient object comes back as a [`LoadedObject`] guard. Dropping the
//! guard flushes the object, so the module's small transient pool returns to
//! its baseline on success, on error and while unwinding from a panic.

use std::cell::RefCell;

use tracing::{debug, warn};

use crate::error::{TpmKeysError, TpmKeysResult};
use crate::model::{AuthValue, Handle, Name, PublicArea};
use crate::ports::{
    AuthHandle, Capability, CapabilityData, Command, ModuleFault, ModuleOpener, ModuleProperties,
    NamedHandle, Operation, Response, Transport, MAX_RANDOM_BYTES,
};

/// One connection to a module and the objects loaded through it
pub struct Session<T: Transport> {
    transport: RefCell<T>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: RefCell::new(transport),
        }
    }

    pub fn open<O>(opener: &O) -> TpmKeysResult<Self>
    where
        O: ModuleOpener<Transport = T>,
    {
        Ok(Self::new(opener.open()?))
    }

    pub(crate) fn execute(&self, command: Command) -> Result<Response, ModuleFault> {
        let mut transport = self
            .transport
            .try_borrow_mut()
            .map_err(|_| ModuleFault::Transport {
                reason: "another command is already in flight on this session".to_string(),
            })?;
        transport.execute(command)
    }

    /// Executes `command`, attributing any module fault to `target`.
    pub(crate) fn run(&self, command: Command, target: Handle) -> TpmKeysResult<Response> {
        let operation = command.operation();
        self.execute(command)
            .map_err(|fault| TpmKeysError::from_fault(operation, target, fault))
    }

    pub fn flush(&self, handle: Handle) -> TpmKeysResult<()> {
        self.run(Command::FlushContext { handle }, handle)?;
        debug!(%handle, "transient object flushed");
        Ok(())
    }

    fn handles(&self, first: u32) -> TpmKeysResult<Vec<Handle>> {
        let response = self.run(
            Command::GetCapability {
                capability: Capability::Handles {
                    first: Handle::new(first),
                    max: u32::MAX,
                },
            },
            Handle::new(first),
        )?;
        match response {
            Response::Capability {
                data: CapabilityData::Handles(handles),
            } => Ok(handles),
            _ => Err(unexpected(Operation::GetCapability)),
        }
    }

    /// Transient objects currently loaded through this session
    pub fn transient_handles(&self) -> TpmKeysResult<Vec<Handle>> {
        let mut handles = self.handles(Handle::TRANSIENT_FIRST)?;
        handles.retain(|handle| handle.is_transient());
        Ok(handles)
    }

    pub fn persistent_handles(&self) -> TpmKeysResult<Vec<Handle>> {
        let mut handles = self.handles(Handle::PERSISTENT_FIRST)?;
        handles.retain(|handle| handle.is_persistent());
        Ok(handles)
    }

    pub fn properties(&self) -> TpmKeysResult<ModuleProperties> {
        let response = self.run(
            Command::GetCapability {
                capability: Capability::Properties,
            },
            Handle::new(0),
        )?;
        match response {
            Response::Capability {
                data: CapabilityData::Properties(properties),
            } => Ok(properties),
            _ => Err(unexpected(Operation::GetCapability)),
        }
    }

    /// `len` random bytes from the module, fetched in as many calls as needed
    pub fn random(&self, len: usize) -> TpmKeysResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(len);
        while bytes.len() < len {
            let wanted = (len - bytes.len()).min(MAX_RANDOM_BYTES) as u16;
            match self.run(
                Command::GetRandom {
                    bytes_requested: wanted,
                },
                Handle::new(0),
            )? {
                Response::Random { bytes: chunk } if !chunk.is_empty() => {
                    bytes.extend_from_slice(&chunk)
                }
                _ => return Err(unexpected(Operation::GetRandom)),
            }
        }
        bytes.truncate(len);
        Ok(bytes)
    }

    /// Reads an object's public area, checking it against the name the
    /// module reports for it.
    pub fn read_public(&self, handle: Handle) -> TpmKeysResult<(PublicArea, Name)> {
        let Response::ReadPublic { public, name } =
            self.run(Command::ReadPublic { handle }, handle)?
        else {
            return Err(unexpected(Operation::ReadPublic));
        };
        let computed = public.name()?;
        if computed != name {
            return Err(TpmKeysError::IdentityMismatch {
                handle,
                expected: computed,
                actual: name,
            });
        }
        Ok((public, name))
    }

    /// Closes the transport. Objects still loaded are released by the module.
    pub fn close(self) -> TpmKeysResult<()> {
        self.transport
            .into_inner()
            .close()
            .map_err(|fault| TpmKeysError::from_fault(Operation::FlushContext, Handle::new(0), fault))
    }
}

/// Opens a session, runs `f` and closes the session whatever `f` returned.
pub fn with_session<O, R, F>(opener: &O, f: F) -> TpmKeysResult<R>
where
    O: ModuleOpener,
    F: FnOnce(&Session<O::Transport>) -> TpmKeysResult<R>,
{
    let session = Session::open(opener)?;
    let result = f(&session);
    let closed = session.close();
    let value = result?;
    closed?;
    Ok(value)
}

pub(crate) fn unexpected(operation: Operation) -> TpmKeysError {
    TpmKeysError::Transport {
        operation,
        reason: "module sent a response of the wrong kind".to_string(),
    }
}

/// An object the module can address by handle and verified name
pub trait ObjectRef {
    fn handle(&self) -> Handle;

    fn name(&self) -> &Name;

    fn public(&self) -> &PublicArea;

    /// Password presented when the object is used
    fn auth(&self) -> &AuthValue;

    fn named_handle(&self) -> NamedHandle {
        NamedHandle {
            handle: self.handle(),
            name: self.name().clone(),
        }
    }

    fn auth_handle(&self) -> AuthHandle {
        AuthHandle {
            handle: self.handle(),
            name: self.name().clone(),
            auth: self.auth().clone(),
        }
    }
}

/// A transient object, flushed when the guard goes out of scope
pub struct LoadedObject<'s, T: Transport> {
    session: &'s Session<T>,
    handle: Handle,
    name: Name,
    public: PublicArea,
    auth: AuthValue,
    released: bool,
}

impl<'s, T: Transport> LoadedObject<'s, T> {
    pub(crate) fn new(session: &'s Session<T>, handle: Handle, name: Name, public: PublicArea) -> Self {
        Self {
            session,
            handle,
            name,
            public,
            auth: AuthValue::empty(),
            released: false,
        }
    }

    /// Sets the password presented on every use of the object.
    pub fn with_auth(mut self, auth: AuthValue) -> Self {
        self.auth = auth;
        self
    }

    /// Flushes the object now and reports whether the flush succeeded.
    ///
    /// After a failed flush the guard still owns the handle and tries once
    /// more when it is dropped at the end of this call.
    pub fn release(mut self) -> TpmKeysResult<()> {
        let flushed = self.session.flush(self.handle);
        self.released = flushed.is_ok();
        flushed
    }
}

impl<T: Transport> ObjectRef for LoadedObject<'_, T> {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn name(&self) -> &Name {
        &self.name
    }

    fn public(&self) -> &PublicArea {
        &self.public
    }

    fn auth(&self) -> &AuthValue {
        &self.auth
    }
}

impl<T: Transport> Drop for LoadedObject<'_, T> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.session.flush(self.handle) {
            warn!(handle = %self.handle, %err, "failed to flush transient object");
        }
    }
}

/// An object held in a persistent slot. Eviction is explicit.
#[derive(Debug, Clone)]
pub struct PersistentObject {
    pub(crate) handle: Handle,
    pub(crate) name: Name,
    pub(crate) public: PublicArea,
    pub(crate) auth: AuthValue,
}

impl PersistentObject {
    pub fn with_auth(mut self, auth: AuthValue) -> Self {
        self.auth = auth;
        self
    }
}

impl ObjectRef for PersistentObject {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn name(&self) -> &Name {
        &self.name
    }

    fn public(&self) -> &PublicArea {
        &self.public
    }

    fn auth(&self) -> &AuthValue {
        &self.auth
    }
}
