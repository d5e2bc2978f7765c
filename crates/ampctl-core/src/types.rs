//! Core types used throughout ampctl.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel returned by read-back operations when the reply could not be
/// decoded (trailer missing, character outside the alphabet, garbage).
///
/// The amplifier line is noisy and carries no checksum, so a bad reply is
/// reported as "unknown" rather than as an error.
pub const VOLUME_UNKNOWN: i32 = -1;

/// Logical (0-based) output zone identifier.
///
/// The device addresses zones 1-based; use [`ZoneId::device_index`] when
/// building wire commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(u8);

impl ZoneId {
    /// Create a `ZoneId` from a logical index.
    pub fn new(index: u8) -> Self {
        ZoneId(index)
    }

    /// Return the logical (0-based) index.
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Return the device-facing (1-based) index.
    pub fn device_index(&self) -> u16 {
        u16::from(self.0) + 1
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone-{}", self.0)
    }
}

/// Logical (0-based) audio input identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(u8);

impl InputId {
    /// Create an `InputId` from a logical index.
    pub fn new(index: u8) -> Self {
        InputId(index)
    }

    /// Return the logical (0-based) index.
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Return the device-facing (1-based) index.
    pub fn device_index(&self) -> u16 {
        u16::from(self.0) + 1
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input-{}", self.0)
    }
}

/// Firmware command/response dialect spoken by the amplifier.
///
/// Both dialects share the `(<index><op>[<payload>])` command shape but
/// differ in tone encoding, volume read-back, and which queries exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Full-featured legacy firmware: decimal volume replies, uppercase
    /// hex tone levels 0-100, bass/treble queries available.
    Legacy,
    /// Constrained firmware currently deployed: pseudo-hex volume replies
    /// with a success trailer, single-digit tone levels 0-15, no tone
    /// queries.
    #[default]
    Constrained,
}

impl Dialect {
    /// Highest logical bass/treble level accepted by this dialect.
    pub fn max_tone_level(&self) -> u8 {
        match self {
            Dialect::Legacy => 100,
            Dialect::Constrained => 15,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Legacy => write!(f, "legacy"),
            Dialect::Constrained => write!(f, "constrained"),
        }
    }
}

/// Error returned when a string cannot be parsed into a [`Dialect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDialectError(String);

impl fmt::Display for ParseDialectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown dialect: {} (expected legacy or constrained)", self.0)
    }
}

impl std::error::Error for ParseDialectError {}

impl FromStr for Dialect {
    type Err = ParseDialectError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "a" => Ok(Dialect::Legacy),
            "constrained" | "b" => Ok(Dialect::Constrained),
            _ => Err(ParseDialectError(s.to_string())),
        }
    }
}

/// Last known state of one output zone.
///
/// Owned by the persistence layer; the driver only reads it while
/// replaying state after the amplifier comes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    pub id: ZoneId,
    /// Logical volume, 0-100.
    pub volume: u8,
    /// Logical bass level; range depends on the [`Dialect`].
    pub bass: u8,
    /// Logical treble level; range depends on the [`Dialect`].
    pub treble: u8,
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub linked_input: Option<InputId>,
}

/// Liveness of the amplifier as tracked by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LivenessState {
    /// The amplifier answers probes. Assumed at startup.
    #[default]
    Alive,
    /// The amplifier stopped answering; waiting for it to talk again.
    Dead,
}

impl fmt::Display for LivenessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LivenessState::Alive => write!(f, "alive"),
            LivenessState::Dead => write!(f, "dead"),
        }
    }
}

/// Static information about a connected amplifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmplifierInfo {
    /// Human-readable model name (e.g. "AE6MC").
    pub model_name: String,
    /// Firmware dialect the driver speaks.
    pub dialect: Dialect,
    /// Number of addressable output zones.
    pub outputs: u8,
    /// Number of selectable inputs.
    pub inputs: u8,
}
