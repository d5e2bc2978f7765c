//! Ae6mcBuilder -- fluent builder for constructing [`Ae6mcAmplifier`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! the serial port, firmware dialect, and line timing before the driver
//! exists. Building never opens the port; that happens on the first
//! command.
//!
//! # Example
//!
//! ```no_run
//! use ampctl_ae6mc::builder::Ae6mcBuilder;
//! use ampctl_ae6mc::models::ae6mc;
//! use ampctl_core::Dialect;
//! use std::time::Duration;
//!
//! # fn example() -> ampctl_core::Result<()> {
//! let amp = Ae6mcBuilder::new(ae6mc())
//!     .serial_port("/dev/ttyUSB0")
//!     .dialect(Dialect::Constrained)
//!     .write_delay(Duration::from_millis(150))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use ampctl_core::error::{Error, Result};
use ampctl_core::transport::Connector;
use ampctl_core::types::Dialect;
use ampctl_transport::{LineTiming, SerialConfig, SerialConnector, SerialLine};

use crate::amplifier::Ae6mcAmplifier;
use crate::models::Ae6mcModel;

/// Fluent builder for [`Ae6mcAmplifier`].
pub struct Ae6mcBuilder {
    model: Ae6mcModel,
    serial_port: Option<String>,
    serial_config: SerialConfig,
    dialect: Dialect,
    timing: LineTiming,
}

impl Ae6mcBuilder {
    /// Create a new builder for the given model.
    pub fn new(model: Ae6mcModel) -> Self {
        Ae6mcBuilder {
            model,
            serial_port: None,
            serial_config: SerialConfig::default(),
            dialect: Dialect::default(),
            timing: LineTiming::default(),
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the serial parameters (default: 19200 8N1, no flow control).
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// Select the firmware dialect (default: constrained).
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the pause after each write (default: 100ms).
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.timing.settle_delay = delay;
        self
    }

    /// Set the timeout for one reply line (default: 1000ms).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.timing.read_timeout = timeout;
        self
    }

    /// Set the timeout for writing one command (default: 500ms).
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.timing.write_timeout = timeout;
        self
    }

    /// Replace all line timing at once.
    pub fn timing(mut self, timing: LineTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Build an [`Ae6mcAmplifier`] with a caller-provided connector.
    ///
    /// This is the entry point for testing (pass a `MockConnector` from
    /// `ampctl-test-harness`).
    pub fn build_with_connector(self, connector: Box<dyn Connector>) -> Result<Ae6mcAmplifier> {
        if self.timing.read_timeout.is_zero() || self.timing.write_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "read and write timeouts must be non-zero".into(),
            ));
        }
        let line = SerialLine::new(connector, self.timing);
        Ok(Ae6mcAmplifier::new(Arc::new(line), self.model, self.dialect))
    }

    /// Build an [`Ae6mcAmplifier`] on a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub fn build(self) -> Result<Ae6mcAmplifier> {
        let port = self
            .serial_port
            .as_deref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;
        let connector = SerialConnector::with_config(port, self.serial_config.clone());
        self.build_with_connector(Box::new(connector))
    }
}
