//! AE6MC command builders and reply parsers.
//!
//! All functions are pure: they produce command strings or decode reply
//! lines without performing any I/O. The driver sends the strings through
//! the serial line and feeds the replies back into the parsers.
//!
//! # Command reference
//!
//! | Operation        | Command          | Notes                              |
//! |------------------|------------------|------------------------------------|
//! | version          | `(vr?)`          |                                    |
//! | reset            | `(rx)`           | never answered                     |
//! | zone on / off    | `(Non)` `(Nof)`  |                                    |
//! | mute / unmute    | `(Nmu)` `(Num)`  |                                    |
//! | mute all         | `(amu)` `(aum)`  | no zone index                      |
//! | set volume       | `(NvlDD)`        | `DD` = device volume, two digits   |
//! | read volume      | `(Nvl?)`         | reply format depends on dialect    |
//! | set bass/treble  | `(NbX)` `(NtX)`  | `X` = hex level, see [`encode_tone`] |
//! | read bass/treble | `(Nb?)` `(Nt?)`  | legacy firmware only               |
//! | link             | `(NslI)`         | `N` = output, `I` = input          |
//!
//! `N` and `I` are 1-based device indices.

use ampctl_core::error::{Error, Result};
use ampctl_core::types::{Dialect, InputId, VOLUME_UNKNOWN, ZoneId};

use crate::protocol::{
    VOLUME_MAX, decode_pseudo_hex_byte, encode_command, is_failure_reply, strip_success_trailer,
    volume_from_device, volume_to_device,
};

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Build a "read firmware version" command (`(vr?)`).
pub fn cmd_read_version() -> String {
    encode_command(None, "vr?", "")
}

/// Build a "reset" command (`(rx)`).
pub fn cmd_reset() -> String {
    encode_command(None, "rx", "")
}

/// Build a zone on/off command (`(1on)` / `(1of)`).
pub fn cmd_set_on_state(zone: ZoneId, on: bool) -> String {
    let op = if on { "on" } else { "of" };
    encode_command(Some(zone.device_index()), op, "")
}

/// Build a zone mute/unmute command (`(1mu)` / `(1um)`).
pub fn cmd_set_mute_state(zone: ZoneId, mute: bool) -> String {
    let op = if mute { "mu" } else { "um" };
    encode_command(Some(zone.device_index()), op, "")
}

/// Build a global mute/unmute command (`(amu)` / `(aum)`).
pub fn cmd_mute_all(mute: bool) -> String {
    let op = if mute { "amu" } else { "aum" };
    encode_command(None, op, "")
}

/// Build a "set volume" command.
///
/// `volume` is logical (0-100) and is scaled to the device range before
/// being written as two decimal digits: 50 becomes `(1vl43)`.
pub fn cmd_set_volume(zone: ZoneId, volume: u8) -> String {
    let raw = volume_to_device(volume);
    encode_command(Some(zone.device_index()), "vl", &format!("{raw:02}"))
}

/// Build a "read volume" command (`(1vl?)`).
pub fn cmd_read_volume(zone: ZoneId) -> String {
    encode_command(Some(zone.device_index()), "vl?", "")
}

/// Build a "set bass" command. The level must already be validated.
pub fn cmd_set_bass(zone: ZoneId, level: u8, dialect: Dialect) -> String {
    encode_command(Some(zone.device_index()), "b", &encode_tone(level, dialect))
}

/// Build a "set treble" command. The level must already be validated.
pub fn cmd_set_treble(zone: ZoneId, level: u8, dialect: Dialect) -> String {
    encode_command(Some(zone.device_index()), "t", &encode_tone(level, dialect))
}

/// Build a "read bass" command (`(1b?)`).
pub fn cmd_read_bass(zone: ZoneId) -> String {
    encode_command(Some(zone.device_index()), "b?", "")
}

/// Build a "read treble" command (`(1t?)`).
pub fn cmd_read_treble(zone: ZoneId) -> String {
    encode_command(Some(zone.device_index()), "t?", "")
}

/// Build a link command routing `input` to `output` (`(2sl5)`).
pub fn cmd_link(input: InputId, output: ZoneId) -> String {
    encode_command(
        Some(output.device_index()),
        "sl",
        &input.device_index().to_string(),
    )
}

/// Encode a tone level for the given dialect.
///
/// Legacy firmware takes uppercase hex of the full 0-100 range (`64` for
/// 100); constrained firmware takes one lowercase hex digit (`f` for 15).
pub fn encode_tone(level: u8, dialect: Dialect) -> String {
    match dialect {
        Dialect::Legacy => format!("{level:X}"),
        Dialect::Constrained => format!("{level:x}"),
    }
}

// ---------------------------------------------------------------
// Validation
// ---------------------------------------------------------------

/// Check a logical volume.
pub fn validate_volume(volume: u8) -> Result<()> {
    if volume > VOLUME_MAX {
        return Err(Error::InvalidParameter(format!(
            "volume {volume} out of range (0-{VOLUME_MAX})"
        )));
    }
    Ok(())
}

/// Check a bass/treble level against the dialect's range.
pub fn validate_tone(level: u8, dialect: Dialect) -> Result<()> {
    let max = dialect.max_tone_level();
    if level > max {
        return Err(Error::InvalidParameter(format!(
            "tone level {level} out of range (0-{max}) for {dialect} firmware"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------
// Reply parsers
// ---------------------------------------------------------------

/// Decode a volume reply into a logical volume.
///
/// Returns [`VOLUME_UNKNOWN`] when the reply cannot be decoded; the line
/// is noisy and a bad reading is not an error.
///
/// - Legacy: the reply is the decimal device volume.
/// - Constrained: the last two characters before [`SUCCESS_TRAILER`] are a
///   pseudo-hex byte (`"3="` + trailer decodes to 70).
///
/// [`SUCCESS_TRAILER`]: crate::protocol::SUCCESS_TRAILER
pub fn parse_volume_response(reply: &str, dialect: Dialect) -> i32 {
    let raw = match dialect {
        Dialect::Legacy => reply.trim().parse::<u8>().ok(),
        Dialect::Constrained => strip_success_trailer(reply).and_then(|prefix| {
            let bytes = prefix.as_bytes();
            let start = bytes.len().checked_sub(2)?;
            decode_pseudo_hex_byte(&bytes[start..])
        }),
    };
    raw.map(volume_from_device).unwrap_or(VOLUME_UNKNOWN)
}

/// Decode a legacy bass/treble reply (hex). Returns [`VOLUME_UNKNOWN`] on
/// garbage.
pub fn parse_tone_response(reply: &str) -> i32 {
    u8::from_str_radix(reply.trim(), 16)
        .map(i32::from)
        .unwrap_or(VOLUME_UNKNOWN)
}

/// Decode a version reply.
///
/// The constrained firmware's success trailer is removed. A failure reply
/// is reported as [`Error::Protocol`].
pub fn parse_version_response(reply: &str, dialect: Dialect) -> Result<String> {
    if is_failure_reply(reply) {
        return Err(Error::Protocol(format!("version query rejected: {reply}")));
    }
    let text = match dialect {
        Dialect::Legacy => reply,
        Dialect::Constrained => strip_success_trailer(reply).unwrap_or(reply),
    };
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SUCCESS_TRAILER;

    fn zone(n: u8) -> ZoneId {
        ZoneId::new(n)
    }

    #[test]
    fn global_commands() {
        assert_eq!(cmd_read_version(), "(vr?)");
        assert_eq!(cmd_reset(), "(rx)");
        assert_eq!(cmd_mute_all(true), "(amu)");
        assert_eq!(cmd_mute_all(false), "(aum)");
    }

    #[test]
    fn zone_commands_use_device_index() {
        for z in 0..6u8 {
            let n = z + 1;
            assert_eq!(cmd_set_on_state(zone(z), true), format!("({n}on)"));
            assert_eq!(cmd_set_on_state(zone(z), false), format!("({n}of)"));
            assert_eq!(cmd_set_mute_state(zone(z), true), format!("({n}mu)"));
            assert_eq!(cmd_set_mute_state(zone(z), false), format!("({n}um)"));
            assert_eq!(cmd_read_volume(zone(z)), format!("({n}vl?)"));
        }
    }

    #[test]
    fn set_volume_is_scaled_and_padded() {
        assert_eq!(cmd_set_volume(zone(0), 50), "(1vl43)");
        assert_eq!(cmd_set_volume(zone(0), 100), "(1vl87)");
        assert_eq!(cmd_set_volume(zone(2), 5), "(3vl04)");
        assert_eq!(cmd_set_volume(zone(5), 0), "(6vl00)");
    }

    #[test]
    fn tone_encoding_per_dialect() {
        assert_eq!(cmd_set_bass(zone(0), 100, Dialect::Legacy), "(1b64)");
        assert_eq!(cmd_set_treble(zone(1), 10, Dialect::Legacy), "(2tA)");
        assert_eq!(cmd_set_bass(zone(0), 15, Dialect::Constrained), "(1bf)");
        assert_eq!(cmd_set_treble(zone(3), 7, Dialect::Constrained), "(4t7)");
        assert_eq!(cmd_read_bass(zone(0)), "(1b?)");
        assert_eq!(cmd_read_treble(zone(5)), "(6t?)");
    }

    #[test]
    fn link_targets_output() {
        assert_eq!(cmd_link(InputId::new(4), zone(1)), "(2sl5)");
        assert_eq!(cmd_link(InputId::new(0), zone(0)), "(1sl1)");
    }

    #[test]
    fn validation() {
        assert!(validate_volume(100).is_ok());
        assert!(matches!(validate_volume(101), Err(Error::InvalidParameter(_))));
        assert!(validate_tone(15, Dialect::Constrained).is_ok());
        assert!(validate_tone(16, Dialect::Constrained).is_err());
        assert!(validate_tone(100, Dialect::Legacy).is_ok());
        assert!(validate_tone(101, Dialect::Legacy).is_err());
    }

    #[test]
    fn legacy_volume_reply() {
        assert_eq!(parse_volume_response("43", Dialect::Legacy), 49);
        assert_eq!(parse_volume_response(" 87 ", Dialect::Legacy), 100);
        assert_eq!(parse_volume_response("", Dialect::Legacy), VOLUME_UNKNOWN);
        assert_eq!(parse_volume_response("4x", Dialect::Legacy), VOLUME_UNKNOWN);
    }

    #[test]
    fn constrained_volume_reply() {
        let reply = format!("3={SUCCESS_TRAILER}");
        assert_eq!(parse_volume_response(&reply, Dialect::Constrained), 70);

        // Leading noise before the two value characters is ignored.
        let reply = format!("~~57{SUCCESS_TRAILER}");
        assert_eq!(parse_volume_response(&reply, Dialect::Constrained), 100);
    }

    #[test]
    fn constrained_volume_reply_malformed() {
        let cases = [
            "3=".to_string(),
            SUCCESS_TRAILER.to_string(),
            format!("3{SUCCESS_TRAILER}"),
            format!("3a{SUCCESS_TRAILER}"),
            "Error 2: Unrecognized Command".to_string(),
            String::new(),
        ];
        for reply in cases {
            assert_eq!(
                parse_volume_response(&reply, Dialect::Constrained),
                VOLUME_UNKNOWN,
                "reply {reply:?}"
            );
        }
    }

    #[test]
    fn tone_reply() {
        assert_eq!(parse_tone_response("64"), 100);
        assert_eq!(parse_tone_response("a\r"), 10);
        assert_eq!(parse_tone_response("zz"), VOLUME_UNKNOWN);
    }

    #[test]
    fn version_reply() {
        assert_eq!(
            parse_version_response("AE6MC v2.1", Dialect::Legacy).unwrap(),
            "AE6MC v2.1"
        );
        let reply = format!("v3.0 {SUCCESS_TRAILER}");
        assert_eq!(
            parse_version_response(&reply, Dialect::Constrained).unwrap(),
            "v3.0"
        );
        let result = parse_version_response("Error 2: Unrecognized Command", Dialect::Constrained);
        assert!(matches!(result, Err(Error::Protocol(_))));
    }
}
