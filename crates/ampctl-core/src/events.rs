//! Asynchronous amplifier event types.
//!
//! Events are emitted through a `tokio::sync::broadcast` channel by the
//! health monitor when the link to the amplifier changes state. The outer
//! application subscribes to surface device availability without polling.

use crate::types::LivenessState;

/// An event emitted when the amplifier link changes state.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmpEvent {
    /// The liveness state changed.
    LivenessChanged {
        from: LivenessState,
        to: LivenessState,
    },

    /// The amplifier stopped answering the active probe.
    LinkLost,

    /// The amplifier talked again; replaying persisted zone state.
    RecoveryStarted,

    /// The replay finished and the amplifier is considered alive.
    LinkRestored,

    /// The replay failed; it will be retried on the next tick.
    RecoveryFailed {
        /// Display form of the replay error.
        reason: String,
    },
}
