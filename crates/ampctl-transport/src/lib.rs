//! Transport implementations for ampctl.
//!
//! - [`SerialTransport`] / [`SerialConnector`]: RS-232 and USB virtual COM
//!   ports via tokio-serial, implementing the core
//!   [`Transport`](ampctl_core::Transport) and
//!   [`Connector`](ampctl_core::Connector) traits.
//! - [`SerialLine`]: the serialized, lazily connected line channel every
//!   driver call and monitor probe goes through.
//!
//! # Example
//!
//! ```no_run
//! use ampctl_transport::{LineTiming, SerialConnector, SerialLine};
//! use std::time::Duration;
//!
//! # async fn example() -> ampctl_core::Result<()> {
//! let line = SerialLine::new(
//!     Box::new(SerialConnector::new("/dev/ttyUSB0")),
//!     LineTiming::with_settle_delay(Duration::from_millis(100)),
//! );
//!
//! let version = line.query("(vr?)").await?;
//! line.write_line("(1on)").await?;
//! # Ok(())
//! # }
//! ```

pub mod line;
pub mod serial;

pub use line::{ConnectionState, LineTiming, SerialLine, MAX_IDLE_LINES};
pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialConnector, SerialTransport, StopBits};
