//! The `Amplifier` trait -- capability interface for multi-zone amplifiers.
//!
//! This is the surface the outer application (HTTP handlers, schedulers,
//! the state replay routine) programs against. The AE6MC backend in
//! `ampctl-ae6mc` provides the concrete implementation.
//!
//! Zone and input arguments are logical 0-based ids; implementations
//! translate them to the device's 1-based indices.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{AmplifierInfo, InputId, ZoneId};

/// Unified asynchronous interface for controlling an amplifier.
///
/// All methods that talk to the device are `async` because they go through
/// a serialized serial line. Writes are not acknowledged by the hardware:
/// an `Ok(())` from a setter means the command was written, not that the
/// amplifier applied it.
#[async_trait]
pub trait Amplifier: Send + Sync {
    /// Return static information about the amplifier (model, dialect, sizes).
    fn info(&self) -> &AmplifierInfo;

    /// Number of addressable output zones.
    fn output_amount(&self) -> u8 {
        self.info().outputs
    }

    /// Number of selectable inputs.
    fn input_amount(&self) -> u8 {
        self.info().inputs
    }

    /// Query the firmware version string.
    async fn get_version(&self) -> Result<String>;

    /// Reset the amplifier. No confirmation is expected.
    async fn reset(&self) -> Result<()>;

    /// Turn a zone on or off.
    async fn set_on_state(&self, zone: ZoneId, on: bool) -> Result<()>;

    /// Mute or unmute a zone.
    async fn set_mute_state(&self, zone: ZoneId, mute: bool) -> Result<()>;

    /// Mute or unmute every zone at once.
    async fn mute_all(&self, mute: bool) -> Result<()>;

    /// Set the logical volume (0-100) of a zone.
    async fn set_volume(&self, zone: ZoneId, volume: u8) -> Result<()>;

    /// Read back the logical volume of a zone.
    ///
    /// Returns [`VOLUME_UNKNOWN`](crate::VOLUME_UNKNOWN) when the reply
    /// cannot be decoded.
    async fn get_volume(&self, zone: ZoneId) -> Result<i32>;

    /// Set the bass level of a zone. Range depends on the dialect.
    async fn set_bass(&self, zone: ZoneId, level: u8) -> Result<()>;

    /// Read back the bass level of a zone.
    async fn get_bass(&self, zone: ZoneId) -> Result<i32>;

    /// Set the treble level of a zone. Range depends on the dialect.
    async fn set_treble(&self, zone: ZoneId, level: u8) -> Result<()>;

    /// Read back the treble level of a zone.
    async fn get_treble(&self, zone: ZoneId) -> Result<i32>;

    /// Route `input` to the `output` zone.
    async fn link(&self, input: InputId, output: ZoneId) -> Result<()>;

    /// Read whether a zone is on.
    async fn get_on_state(&self, _zone: ZoneId) -> Result<bool> {
        Err(Error::NotSupported("on-state read-back".into()))
    }

    /// Read whether a zone is muted.
    async fn get_mute_state(&self, _zone: ZoneId) -> Result<bool> {
        Err(Error::NotSupported("mute-state read-back".into()))
    }
}
