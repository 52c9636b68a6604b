//! Ports for talking to a security module
//!
//! The core depends on these traits and the command vocabulary, never on a
//! concrete module. Adapters implement them for the software module and for
//! test doubles.

mod command;
pub mod contract_tests;
mod transport;

pub use command::{
    AuthHandle, Capability, CapabilityData, Command, ModuleProperties, NamedHandle, Operation,
    Response, MAX_BUFFER, MAX_RANDOM_BYTES,
};
pub use transport::{ModuleFault, ModuleOpener, ResponseCode, Transport};
