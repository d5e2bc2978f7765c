//! Transport and connector traits for amplifier communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the
//! amplifier. The production implementation is a tokio-serial port in
//! `ampctl-transport`; tests use `MockTransport` from `ampctl-test-harness`.
//!
//! Connections are opened lazily, so the line channel does not hold a
//! transport at construction time. Instead it holds a [`Connector`] that
//! knows how to produce one on first use and again after the link drops.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to the amplifier.
///
/// Implementations handle buffering and error mapping at the physical
/// layer. Line framing and command structure are handled by the consumers
/// of this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the amplifier.
    ///
    /// Implementations should block until all bytes have been written to
    /// the serial TX buffer.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the amplifier into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Factory for [`Transport`] instances.
///
/// Called every time the line channel needs a fresh connection: on the
/// first command and after a link-level failure dropped the previous one.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to the amplifier.
    async fn connect(&self) -> Result<Box<dyn Transport>>;

    /// Human-readable endpoint name (e.g. `/dev/ttyUSB0`), for logging.
    fn endpoint(&self) -> &str;
}
