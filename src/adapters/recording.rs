//! Transport wrapper for tests: records every operation, can fail a chosen
//! operation and can misreport the object name another one returns.

use std::cell::RefCell;
use std::rc::Rc;

use crate::model::Name;
use crate::ports::{Command, ModuleFault, Operation, Response, Transport};

pub type OperationLog = Rc<RefCell<Vec<Operation>>>;

pub struct RecordingTransport<T> {
    inner: T,
    log: OperationLog,
    fail_on: Option<(Operation, ModuleFault)>,
    fail_once: bool,
    tamper_on: Option<Operation>,
}

impl<T: Transport> RecordingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            log: Rc::default(),
            fail_on: None,
            fail_once: false,
            tamper_on: None,
        }
    }

    /// Every `operation` fails with `fault` without reaching the inner transport.
    pub fn failing_on(mut self, operation: Operation, fault: ModuleFault) -> Self {
        self.fail_on = Some((operation, fault));
        self
    }

    /// Only the next `operation` fails; later ones reach the inner transport.
    pub fn failing_once_on(mut self, operation: Operation, fault: ModuleFault) -> Self {
        self.fail_on = Some((operation, fault));
        self.fail_once = true;
        self
    }

    /// Names returned by `operation` no longer match the object.
    pub fn tampering_names_on(mut self, operation: Operation) -> Self {
        self.tamper_on = Some(operation);
        self
    }

    pub fn log(&self) -> OperationLog {
        Rc::clone(&self.log)
    }

    fn tamper(&self, operation: Operation, name: Name) -> Name {
        if self.tamper_on != Some(operation) {
            return name;
        }
        let mut bytes = name.as_bytes().to_vec();
        if let Some(last) = bytes.last_mut() {
            *last ^= 0xFF;
        }
        Name::from_bytes(bytes).unwrap_or(name)
    }
}

impl<T: Transport> Transport for RecordingTransport<T> {
    fn execute(&mut self, command: Command) -> Result<Response, ModuleFault> {
        let operation = command.operation();
        self.log.borrow_mut().push(operation);
        if let Some((failing, fault)) = &self.fail_on {
            if *failing == operation {
                let fault = fault.clone();
                if self.fail_once {
                    self.fail_on = None;
                }
                return Err(fault);
            }
        }

        Ok(match self.inner.execute(command)? {
            Response::CreatePrimary {
                handle,
                public,
                name,
            } => Response::CreatePrimary {
                handle,
                public,
                name: self.tamper(operation, name),
            },
            Response::Load { handle, name } => Response::Load {
                handle,
                name: self.tamper(operation, name),
            },
            Response::ReadPublic { public, name } => Response::ReadPublic {
                public,
                name: self.tamper(operation, name),
            },
            other => other,
        })
    }

    fn close(&mut self) -> Result<(), ModuleFault> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftwareModule;
    use crate::contract_tests_for;
    use crate::ports::contract_tests::transport_contract;
    use crate::ports::ResponseCode;

    contract_tests_for!(
        recording_transport_contract,
        make = || RecordingTransport::new(SoftwareModule::in_memory().connect()),
        tests = {
            test_primary_is_reproducible => transport_contract::test_primary_is_reproducible,
            test_slot_exhaustion => transport_contract::test_slot_exhaustion,
            test_flush_frees_slot => transport_contract::test_flush_frees_slot,
            test_unknown_handle => transport_contract::test_unknown_handle,
            test_name_mismatch_is_bad_auth => transport_contract::test_name_mismatch_is_bad_auth,
            test_restricted_sign_needs_ticket => transport_contract::test_restricted_sign_needs_ticket,
            test_seal_limit => transport_contract::test_seal_limit,
            test_tampered_private_fails_integrity => transport_contract::test_tampered_private_fails_integrity,
            test_persistent_slot_occupied => transport_contract::test_persistent_slot_occupied,
            test_closed_transport_fails => transport_contract::test_closed_transport_fails,
        }
    );

    #[test]
    fn test_records_operations_and_injects_faults() {
        let mut transport = RecordingTransport::new(SoftwareModule::in_memory().connect())
            .failing_on(Operation::GetRandom, ResponseCode::Value.into());
        let log = transport.log();

        assert_eq!(
            transport
                .execute(Command::GetRandom { bytes_requested: 4 })
                .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Value)
        );
        assert!(transport
            .execute(Command::Hash {
                data: b"x".to_vec(),
                hash_alg: crate::model::HashAlg::Sha1,
                hierarchy: crate::model::Hierarchy::Null,
            })
            .is_ok());
        assert_eq!(*log.borrow(), vec![Operation::GetRandom, Operation::Hash]);
    }
}
