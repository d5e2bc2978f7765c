//! ampctl-monitor: liveness tracking and automatic state replay.
//!
//! [`HealthMonitor`] polls the amplifier through a [`Probe`] on a fixed
//! period. When a dead amplifier starts talking again it runs a
//! [`RecoveryReplay`] (normally a [`StateReplay`]) before declaring the
//! link alive, so zones come back the way they were left.

pub mod health;
pub mod replay;

pub use health::{DEFAULT_PERIOD, HealthMonitor, MIN_PERIOD, MonitorHandle, Probe};
pub use replay::{
    MemoryZoneSource, RecoveryReplay, StateReplay, ZoneStateSource, replay_zone_states,
};
