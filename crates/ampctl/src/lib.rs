//! # ampctl -- Multi-zone amplifier control over RS-232
//!
//! `ampctl` is an asynchronous Rust library for driving the AE6MC
//! multi-zone audio amplifier from a home-automation controller. It
//! serializes every command onto the single serial line, decodes both
//! deployed firmware dialects, and watches the link so that zone state is
//! re-applied automatically after the amplifier loses power.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ampctl::{Amplifier, Dialect, ZoneId};
//! use ampctl::ae6mc::{Ae6mcBuilder, models::ae6mc};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let amp = Ae6mcBuilder::new(ae6mc())
//!         .serial_port("/dev/ttyUSB0")
//!         .dialect(Dialect::Constrained)
//!         .build()?;
//!
//!     amp.set_on_state(ZoneId::new(0), true).await?;
//!     amp.set_volume(ZoneId::new(0), 40).await?;
//!     println!("volume: {}", amp.get_volume(ZoneId::new(0)).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `ampctl-core`         | [`Amplifier`] trait, types, errors, events       |
//! | `ampctl-transport`    | Serial transport and the serialized line channel |
//! | `ampctl-ae6mc`        | AE6MC command protocol driver                    |
//! | `ampctl-monitor`      | Liveness monitor and state replay                |
//! | **`ampctl`**          | This facade crate -- re-exports everything       |
//!
//! ## Liveness monitoring
//!
//! [`spawn_monitor`] starts a [`HealthMonitor`](monitor::HealthMonitor)
//! that probes the amplifier every 15 seconds and, when a dead amplifier
//! starts talking again, replays the zone states held by a
//! [`ZoneStateSource`](monitor::ZoneStateSource):
//!
//! ```no_run
//! use std::sync::Arc;
//! use ampctl::{AmpEvent, ZoneState};
//! use ampctl::ae6mc::{Ae6mcBuilder, models::ae6mc};
//! use ampctl::monitor::MemoryZoneSource;
//!
//! # async fn example(zones: Vec<ZoneState>) -> ampctl::Result<()> {
//! let amp = Arc::new(Ae6mcBuilder::new(ae6mc()).serial_port("/dev/ttyUSB0").build()?);
//! let source = Arc::new(MemoryZoneSource::new(zones));
//! let handle = ampctl::spawn_monitor(amp, source, ampctl::monitor::DEFAULT_PERIOD);
//!
//! let mut events = handle.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let AmpEvent::LinkRestored = event {
//!         println!("amplifier is back");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

pub use ampctl_core::*;

/// AE6MC protocol backend.
///
/// Provides [`Ae6mcAmplifier`](ae6mc::Ae6mcAmplifier) and
/// [`Ae6mcBuilder`](ae6mc::Ae6mcBuilder) for both firmware dialects.
pub mod ae6mc {
    pub use ampctl_ae6mc::*;
}

/// Liveness monitor and state replay.
pub mod monitor {
    pub use ampctl_monitor::*;
}

/// Serial transport and line channel.
pub mod transport {
    pub use ampctl_transport::*;
}

/// Returns every supported amplifier model.
///
/// # Example
///
/// ```
/// for model in ampctl::supported_amplifiers() {
///     println!("{}: {} zones, {} inputs", model.name, model.outputs, model.inputs);
/// }
/// ```
pub fn supported_amplifiers() -> Vec<ae6mc::Ae6mcModel> {
    vec![ae6mc::models::ae6mc()]
}

/// Start monitoring `amp`, replaying the states from `source` whenever it
/// comes back after being unreachable.
///
/// Must be called from within a tokio runtime.
pub fn spawn_monitor(
    amp: Arc<ae6mc::Ae6mcAmplifier>,
    source: Arc<dyn monitor::ZoneStateSource>,
    period: Duration,
) -> monitor::MonitorHandle {
    let replay = monitor::StateReplay::new(amp.clone(), source);
    monitor::HealthMonitor::new(amp, Arc::new(replay))
        .with_period(period)
        .spawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ampctl_test_harness::{MockConnector, MockTransport};

    #[test]
    fn lists_the_ae6mc() {
        let models = supported_amplifiers();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "AE6MC");
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_replays_after_power_cycle() {
        // Powered off: writes vanish, nothing comes back.
        let mock = MockTransport::recording();
        let amp = Arc::new(
            ae6mc::Ae6mcBuilder::new(ae6mc::models::ae6mc())
                .build_with_connector(Box::new(MockConnector::new(mock.clone())))
                .unwrap(),
        );
        let zone = ZoneState {
            id: ZoneId::new(1),
            volume: 50,
            bass: 3,
            treble: 4,
            on: true,
            mute: false,
            linked_input: Some(InputId::new(2)),
        };
        let source = Arc::new(monitor::MemoryZoneSource::new(vec![zone]));

        let handle = spawn_monitor(amp, source, Duration::from_secs(15));
        let mut events = handle.subscribe();

        // First tick: version query goes unanswered.
        assert_eq!(events.recv().await.unwrap(), AmpEvent::LivenessChanged {
            from: LivenessState::Alive,
            to: LivenessState::Dead,
        });
        assert_eq!(events.recv().await.unwrap(), AmpEvent::LinkLost);

        // Power comes back: the amplifier prints its trailer unprompted.
        mock.push_unsolicited(b"Error 1: No ~ detected\n");
        assert_eq!(events.recv().await.unwrap(), AmpEvent::RecoveryStarted);
        assert_eq!(events.recv().await.unwrap(), AmpEvent::LivenessChanged {
            from: LivenessState::Dead,
            to: LivenessState::Alive,
        });
        assert_eq!(events.recv().await.unwrap(), AmpEvent::LinkRestored);
        assert_eq!(handle.state(), LivenessState::Alive);

        let sent = mock.sent_strings();
        assert_eq!(
            &sent[sent.len() - 6..],
            ["(2b3)", "(2t4)", "(2vl43)", "(2on)", "(2um)", "(2sl3)"]
        );
        handle.shutdown().await.unwrap();
    }
}
