//! Mock [`Connector`] that hands out a shared [`MockTransport`].
//!
//! Lets tests drive the lazy-connect path of the line channel: count how
//! many times the port was (re)opened and make the port unavailable to
//! simulate an unplugged USB adapter.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ampctl_core::error::{Error, Result};
use ampctl_core::transport::{Connector, Transport};

use crate::mock_serial::MockTransport;

/// A [`Connector`] whose every connection is a clone of one [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    transport: MockTransport,
    available: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    /// Wrap `transport`. The port starts out available.
    pub fn new(transport: MockTransport) -> Self {
        MockConnector {
            transport,
            available: Arc::new(AtomicBool::new(true)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make subsequent `connect()` calls succeed or fail.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `connect()` calls so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The shared transport handle, for setting expectations and inspecting traffic.
    pub fn transport(&self) -> &MockTransport {
        &self.transport
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::Connectivity("mock port unavailable".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.transport.set_connected(true);
        Ok(Box::new(self.transport.clone()))
    }

    fn endpoint(&self) -> &str {
        "mock"
    }
}
