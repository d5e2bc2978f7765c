//! ampctl-core: Core traits, types, and error definitions for ampctl.
//!
//! This crate defines the device-agnostic abstractions shared by the
//! transport, the AE6MC driver, and the health monitor. Applications
//! depend on these types without pulling in serial-port code.
//!
//! # Key types
//!
//! - [`Amplifier`] -- capability interface for a multi-zone amplifier
//! - [`Transport`] / [`Connector`] -- byte-level link and its factory
//! - [`AmpEvent`] -- link state notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod amplifier;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use ampctl_core::*`.
pub use amplifier::Amplifier;
pub use error::{Error, Result};
pub use events::AmpEvent;
pub use transport::{Connector, Transport};
pub use types::*;
