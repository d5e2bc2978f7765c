//! Watch the amplifier link.
//!
//! Starts the health monitor with one remembered zone and prints link
//! events as they arrive. Power-cycle the amplifier to see the zone state
//! being replayed.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p ampctl --example monitor_events
//! ```

use std::sync::Arc;

use ampctl::ae6mc::Ae6mcBuilder;
use ampctl::ae6mc::models::ae6mc;
use ampctl::monitor::{DEFAULT_PERIOD, MemoryZoneSource};
use ampctl::{AmpEvent, InputId, ZoneId, ZoneState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let amp = Arc::new(Ae6mcBuilder::new(ae6mc()).serial_port("/dev/ttyUSB0").build()?);

    let source = Arc::new(MemoryZoneSource::new(vec![ZoneState {
        id: ZoneId::new(0),
        volume: 30,
        bass: 7,
        treble: 7,
        on: true,
        mute: false,
        linked_input: Some(InputId::new(0)),
    }]));

    let handle = ampctl::spawn_monitor(amp, source, DEFAULT_PERIOD);
    let mut events = handle.subscribe();
    println!("Monitoring (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(AmpEvent::LivenessChanged { from, to }) => println!("{from} -> {to}"),
                Ok(AmpEvent::RecoveryFailed { reason }) => println!("replay failed: {reason}"),
                Ok(event) => println!("{event:?}"),
                Err(_) => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}
