//! Adapters - concrete implementations of ports (traits)

mod software;

#[cfg(test)]
pub mod recording;

pub use software::{SoftwareConnection, SoftwareModule};
