//! ampctl-test-harness: Test utilities and mock transports for ampctl.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the line channel and the AE6MC driver without an amplifier attached,
//! and [`MockConnector`] for exercising lazy connection and reconnect.

pub mod mock_connector;
pub mod mock_serial;

pub use mock_connector::MockConnector;
pub use mock_serial::{MockEvent, MockTransport};
