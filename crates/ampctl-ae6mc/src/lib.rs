//! AE6MC protocol backend for ampctl.
//!
//! This crate implements the parenthesised ASCII command protocol spoken by
//! the AE6MC six-zone amplifier. It provides:
//!
//! - **Protocol codec** ([`protocol`]) -- command framing, reply trailers,
//!   the pseudo-hex digit alphabet, and volume scaling.
//! - **Command builders** ([`commands`]) -- construct commands for every
//!   operation and decode the corresponding replies per firmware dialect.
//! - **Model definitions** ([`models`]) -- zone and input counts.
//! - **Amplifier driver** ([`amplifier`]) -- full
//!   [`Amplifier`](ampctl_core::Amplifier) implementation over a serialized
//!   line, plus the [`Probe`](ampctl_monitor::Probe) hooks for the health
//!   monitor.
//! - **Builder** ([`builder`]) -- fluent builder for [`Ae6mcAmplifier`].
//!
//! # Firmware dialects
//!
//! Two firmware revisions are deployed. Both share the command shape but:
//! - legacy firmware answers volume queries in decimal and accepts tone
//!   levels 0-100 as uppercase hex, with read-back;
//! - constrained firmware answers in pseudo-hex followed by a trailer that
//!   reads `Error 1: No ~ detected` on success, and accepts tone levels
//!   0-15 as a single hex digit, without read-back.
//!
//! # Example
//!
//! ```
//! use ampctl_ae6mc::commands::{cmd_set_volume, parse_volume_response};
//! use ampctl_core::{Dialect, ZoneId};
//!
//! // Logical volume 50 on the first zone.
//! assert_eq!(cmd_set_volume(ZoneId::new(0), 50), "(1vl43)");
//!
//! // A constrained-firmware volume reply.
//! let volume = parse_volume_response("3=Error 1: No ~ detected", Dialect::Constrained);
//! assert_eq!(volume, 70);
//! ```

pub mod amplifier;
pub mod builder;
pub mod commands;
pub mod models;
pub mod protocol;

// Re-export the primary types for ergonomic `use ampctl_ae6mc::*`.
pub use amplifier::Ae6mcAmplifier;
pub use builder::Ae6mcBuilder;
pub use models::Ae6mcModel;
