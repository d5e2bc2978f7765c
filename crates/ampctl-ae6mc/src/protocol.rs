//! AE6MC text protocol encoder/decoder.
//!
//! Commands are short ASCII strings wrapped in parentheses. The zone (or
//! input) index is 1-based and comes first; global commands omit it.
//!
//! # Command format
//!
//! ```text
//! (<index><op>[<payload>])
//! ```
//!
//! - `index`: decimal, 1-based (`1` for the first zone).
//! - `op`: lowercase opcode (`on`, `vl`, `b`, `sl`, ...). A trailing `?`
//!   turns it into a query.
//! - `payload`: optional argument, format depends on the opcode.
//!
//! # Replies
//!
//! Replies are newline-terminated ASCII lines. The constrained firmware
//! appends [`SUCCESS_TRAILER`] to every reply it understood, even though
//! it reads like an error, and answers with [`FAILURE_TRAILER`] when it did
//! not recognise the command.
//!
//! # Volume scaling
//!
//! The device volume range is `0..=87`. Logical volumes `0..=100` are
//! scaled down with integer truncation (`v * 87 / 100`) on the way out and
//! back up (`raw * 100 / 87`) on the way in, so a round trip can lose up
//! to two steps.

/// Marker the constrained firmware appends to replies it accepted.
pub const SUCCESS_TRAILER: &str = "Error 1: No ~ detected";

/// Reply the firmware sends for a command it did not recognise.
pub const FAILURE_TRAILER: &str = "Error 2: Unrecognized Command";

/// Highest volume value the device accepts.
pub const DEVICE_VOLUME_MAX: u8 = 87;

/// Highest logical volume.
pub const VOLUME_MAX: u8 = 100;

/// Encode one command line.
///
/// # Example
///
/// ```
/// use ampctl_ae6mc::protocol::encode_command;
///
/// assert_eq!(encode_command(Some(3), "vl", "43"), "(3vl43)");
/// assert_eq!(encode_command(None, "vr?", ""), "(vr?)");
/// ```
pub fn encode_command(index: Option<u16>, op: &str, payload: &str) -> String {
    match index {
        Some(index) => format!("({index}{op}{payload})"),
        None => format!("({op}{payload})"),
    }
}

/// Scale a logical volume (0-100) to the device range (0-87).
pub fn volume_to_device(volume: u8) -> u8 {
    (u16::from(volume) * u16::from(DEVICE_VOLUME_MAX) / u16::from(VOLUME_MAX)) as u8
}

/// Scale a raw device volume back to the logical range.
pub fn volume_from_device(raw: u8) -> i32 {
    i32::from(raw) * i32::from(VOLUME_MAX) / i32::from(DEVICE_VOLUME_MAX)
}

/// Decode one pseudo-hex digit.
///
/// The constrained firmware prints nibble values by adding them to `'0'`,
/// so 10-15 come out as `: ; < = > ?` instead of `a`-`f`.
pub fn pseudo_hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'?' => Some(c - b'0'),
        _ => None,
    }
}

/// Decode a two-character pseudo-hex byte (`"3="` is `0x3D`).
pub fn decode_pseudo_hex_byte(s: &[u8]) -> Option<u8> {
    match s {
        [hi, lo] => Some((pseudo_hex_digit(*hi)? << 4) | pseudo_hex_digit(*lo)?),
        _ => None,
    }
}

/// Return the text in front of [`SUCCESS_TRAILER`], or `None` if the
/// trailer is absent.
pub fn strip_success_trailer(reply: &str) -> Option<&str> {
    reply.find(SUCCESS_TRAILER).map(|pos| &reply[..pos])
}

/// Whether the reply is the firmware's "unrecognised command" answer.
pub fn is_failure_reply(reply: &str) -> bool {
    reply.contains(FAILURE_TRAILER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_with_and_without_index() {
        assert_eq!(encode_command(Some(1), "on", ""), "(1on)");
        assert_eq!(encode_command(Some(6), "sl", "7"), "(6sl7)");
        assert_eq!(encode_command(None, "amu", ""), "(amu)");
        assert_eq!(encode_command(None, "rx", ""), "(rx)");
    }

    #[test]
    fn volume_scaling_truncates() {
        assert_eq!(volume_to_device(0), 0);
        assert_eq!(volume_to_device(50), 43);
        assert_eq!(volume_to_device(100), 87);
        assert_eq!(volume_from_device(43), 49);
        assert_eq!(volume_from_device(87), 100);
    }

    #[test]
    fn volume_round_trip_loses_at_most_two_steps() {
        for v in 0..=VOLUME_MAX {
            let back = volume_from_device(volume_to_device(v));
            let expected = (i32::from(v) * 87 / 100) * 100 / 87;
            assert_eq!(back, expected);
            assert!(i32::from(v) - back <= 2, "{v} came back as {back}");
        }
    }

    #[test]
    fn pseudo_hex_alphabet() {
        let alphabet = b"0123456789:;<=>?";
        for (value, c) in alphabet.iter().enumerate() {
            assert_eq!(pseudo_hex_digit(*c), Some(value as u8));
        }
        assert_eq!(pseudo_hex_digit(b'a'), None);
        assert_eq!(pseudo_hex_digit(b'@'), None);
        assert_eq!(pseudo_hex_digit(b'/'), None);
    }

    #[test]
    fn pseudo_hex_byte() {
        assert_eq!(decode_pseudo_hex_byte(b"3="), Some(61));
        assert_eq!(decode_pseudo_hex_byte(b"00"), Some(0));
        assert_eq!(decode_pseudo_hex_byte(b"57"), Some(87));
        assert_eq!(decode_pseudo_hex_byte(b"3"), None);
        assert_eq!(decode_pseudo_hex_byte(b"3=0"), None);
        assert_eq!(decode_pseudo_hex_byte(b"3x"), None);
    }

    #[test]
    fn trailer_handling() {
        assert_eq!(
            strip_success_trailer("3=Error 1: No ~ detected"),
            Some("3=")
        );
        assert_eq!(strip_success_trailer(SUCCESS_TRAILER), Some(""));
        assert_eq!(strip_success_trailer("3="), None);
        assert!(is_failure_reply("Error 2: Unrecognized Command"));
        assert!(!is_failure_reply(SUCCESS_TRAILER));
    }
}
