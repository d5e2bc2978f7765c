//! Basic zone control example.
//!
//! Turns on the first zone of an AE6MC, routes the second input to it,
//! sets volume and tone, and reads the volume back.
//!
//! # Requirements
//!
//! - An AE6MC connected via RS-232 or a USB serial adapter
//! - The serial port path adjusted for your system (e.g., `/dev/ttyUSB0`
//!   on Linux, `COM3` on Windows)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p ampctl --example basic_zone
//! ```

use std::time::Duration;

use ampctl::ae6mc::Ae6mcBuilder;
use ampctl::ae6mc::models::ae6mc;
use ampctl::{Amplifier, Dialect, InputId, ZoneId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    let amp = Ae6mcBuilder::new(ae6mc())
        .serial_port(serial_port)
        .dialect(Dialect::Constrained)
        .write_delay(Duration::from_millis(100))
        .build()?;

    let info = amp.info();
    println!(
        "{} on {} ({} firmware, {} zones, {} inputs)",
        info.model_name,
        serial_port,
        info.dialect,
        info.outputs,
        info.inputs
    );
    println!("Version: {}", amp.get_version().await?);

    let zone = ZoneId::new(0);
    amp.set_on_state(zone, true).await?;
    amp.link(InputId::new(1), zone).await?;
    amp.set_bass(zone, 8).await?;
    amp.set_treble(zone, 8).await?;
    amp.set_volume(zone, 35).await?;

    match amp.get_volume(zone).await? {
        v if v < 0 => println!("Volume: unreadable reply"),
        v => println!("Volume: {v}"),
    }

    Ok(())
}
