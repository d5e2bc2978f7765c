// In-process AE6MC emulator behind `--mock`, for exercising the CLI
// without hardware. Remembers volume and tone per zone and answers queries
// in the selected dialect.

use std::sync::{Arc, Mutex};

use ampctl::Dialect;
use ampctl::ae6mc::protocol::{FAILURE_TRAILER, SUCCESS_TRAILER};
use ampctl_test_harness::{MockConnector, MockTransport};

const ZONES: usize = 6;

#[derive(Default)]
struct Device {
    volume: [u8; ZONES],
    bass: [u8; ZONES],
    treble: [u8; ZONES],
}

/// Connector whose port is an emulated amplifier.
pub fn connector(dialect: Dialect) -> MockConnector {
    let device = Arc::new(Mutex::new(Device::default()));
    let transport = MockTransport::with_responder(move |cmd| {
        let cmd = std::str::from_utf8(cmd).ok()?;
        let mut device = device.lock().unwrap_or_else(|e| e.into_inner());
        respond(&mut device, dialect, cmd).map(|reply| format!("{reply}\r\n").into_bytes())
    });
    MockConnector::new(transport)
}

fn respond(device: &mut Device, dialect: Dialect, cmd: &str) -> Option<String> {
    let body = cmd.strip_prefix('(')?.strip_suffix(')')?;
    let reply = |text: String| match dialect {
        Dialect::Legacy => text,
        Dialect::Constrained => format!("{text}{SUCCESS_TRAILER}"),
    };

    if body == "vr?" {
        return Some(reply("AE6MC mock".to_string()));
    }

    let digits = body.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 {
        // Global writes (reset, mute all) are never answered.
        return None;
    }
    let zone = body[..digits].parse::<usize>().ok()?.checked_sub(1)?;
    let (op, arg) = body[digits..].split_at(body[digits..].len().min(2));
    if zone >= ZONES {
        return Some(FAILURE_TRAILER.to_string());
    }

    match (op, arg) {
        ("vl", "?") => {
            let raw = device.volume[zone];
            Some(match dialect {
                Dialect::Legacy => raw.to_string(),
                Dialect::Constrained => reply(pseudo_hex(raw)),
            })
        }
        ("vl", value) => {
            device.volume[zone] = value.parse().ok()?;
            None
        }
        (op, rest) if op.starts_with('b') || op.starts_with('t') => {
            // One-letter opcodes: re-split after the first character.
            let (op, arg) = op.split_at(1);
            let arg = format!("{arg}{rest}");
            let slot = if op == "b" {
                &mut device.bass[zone]
            } else {
                &mut device.treble[zone]
            };
            if arg == "?" {
                return match dialect {
                    Dialect::Legacy => Some(format!("{:X}", *slot)),
                    Dialect::Constrained => Some(FAILURE_TRAILER.to_string()),
                };
            }
            *slot = u8::from_str_radix(&arg, 16).ok()?;
            None
        }
        _ => None,
    }
}

fn pseudo_hex(raw: u8) -> String {
    [raw >> 4, raw & 0x0f]
        .iter()
        .map(|n| char::from(b'0' + n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ampctl::ae6mc::{Ae6mcBuilder, models::ae6mc};
    use ampctl::{Amplifier, ZoneId};

    #[tokio::test]
    async fn emulated_volume_and_tone() {
        for dialect in [Dialect::Legacy, Dialect::Constrained] {
            let amp = Ae6mcBuilder::new(ae6mc())
                .dialect(dialect)
                .write_delay(std::time::Duration::ZERO)
                .build_with_connector(Box::new(connector(dialect)))
                .unwrap();

            assert_eq!(amp.get_version().await.unwrap(), "AE6MC mock");
            amp.set_volume(ZoneId::new(2), 60).await.unwrap();
            assert_eq!(amp.get_volume(ZoneId::new(2)).await.unwrap(), 59);
            amp.set_bass(ZoneId::new(2), 12).await.unwrap();
            amp.set_on_state(ZoneId::new(2), true).await.unwrap();
            amp.mute_all(false).await.unwrap();

            if dialect == Dialect::Legacy {
                assert_eq!(amp.get_bass(ZoneId::new(2)).await.unwrap(), 12);
            }
        }
    }
}
