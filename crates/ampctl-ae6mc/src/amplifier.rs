//! Ae6mcAmplifier -- the [`Amplifier`] trait implementation for the AE6MC.
//!
//! This module ties the command builders ([`commands`]) to a [`SerialLine`]
//! to produce a working driver. The hardware never acknowledges writes, so
//! every mutating operation is a single `write_line` followed by the line's
//! settle delay. Read-backs go through `SerialLine::query`, which holds
//! the line across the write and the reply.
//!
//! One driver covers both firmware dialects; the [`Dialect`] picked at
//! build time selects tone encoding and reply decoding.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ampctl_core::amplifier::Amplifier;
use ampctl_core::error::{Error, Result};
use ampctl_core::types::{AmplifierInfo, Dialect, InputId, ZoneId};
use ampctl_monitor::Probe;
use ampctl_transport::SerialLine;

use crate::commands;
use crate::models::Ae6mcModel;

/// A connected AE6MC amplifier.
///
/// Constructed via [`Ae6mcBuilder`](crate::builder::Ae6mcBuilder). The port
/// is opened lazily on the first command.
pub struct Ae6mcAmplifier {
    line: Arc<SerialLine>,
    model: Ae6mcModel,
    dialect: Dialect,
    info: AmplifierInfo,
}

impl Ae6mcAmplifier {
    pub(crate) fn new(line: Arc<SerialLine>, model: Ae6mcModel, dialect: Dialect) -> Self {
        let info = model.info(dialect);
        Ae6mcAmplifier {
            line,
            model,
            dialect,
            info,
        }
    }

    /// The serial line this driver talks through.
    pub fn line(&self) -> &Arc<SerialLine> {
        &self.line
    }

    /// The model definition.
    pub fn model(&self) -> &Ae6mcModel {
        &self.model
    }

    /// The firmware dialect this driver speaks.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn check_zone(&self, zone: ZoneId) -> Result<()> {
        if zone.index() >= self.model.outputs {
            return Err(Error::InvalidParameter(format!(
                "{zone} out of range (0-{})",
                self.model.outputs - 1
            )));
        }
        Ok(())
    }

    fn check_input(&self, input: InputId) -> Result<()> {
        if input.index() >= self.model.inputs {
            return Err(Error::InvalidParameter(format!(
                "{input} out of range (0-{})",
                self.model.inputs - 1
            )));
        }
        Ok(())
    }

    fn require_legacy(&self, what: &str) -> Result<()> {
        match self.dialect {
            Dialect::Legacy => Ok(()),
            Dialect::Constrained => Err(Error::NotSupported(format!(
                "{what} on {} firmware",
                self.dialect
            ))),
        }
    }

    async fn write(&self, cmd: &str) -> Result<()> {
        debug!(port = %self.line.endpoint(), cmd, "Sending command");
        self.line.write_line(cmd).await
    }

    async fn query(&self, cmd: &str) -> Result<String> {
        debug!(port = %self.line.endpoint(), cmd, "Sending query");
        self.line.query(cmd).await
    }
}

#[async_trait]
impl Amplifier for Ae6mcAmplifier {
    fn info(&self) -> &AmplifierInfo {
        &self.info
    }

    async fn get_version(&self) -> Result<String> {
        let reply = self.query(&commands::cmd_read_version()).await?;
        commands::parse_version_response(&reply, self.dialect)
    }

    async fn reset(&self) -> Result<()> {
        self.write(&commands::cmd_reset()).await
    }

    async fn set_on_state(&self, zone: ZoneId, on: bool) -> Result<()> {
        self.check_zone(zone)?;
        self.write(&commands::cmd_set_on_state(zone, on)).await
    }

    async fn set_mute_state(&self, zone: ZoneId, mute: bool) -> Result<()> {
        self.check_zone(zone)?;
        self.write(&commands::cmd_set_mute_state(zone, mute)).await
    }

    async fn mute_all(&self, mute: bool) -> Result<()> {
        self.write(&commands::cmd_mute_all(mute)).await
    }

    async fn set_volume(&self, zone: ZoneId, volume: u8) -> Result<()> {
        self.check_zone(zone)?;
        commands::validate_volume(volume)?;
        self.write(&commands::cmd_set_volume(zone, volume)).await
    }

    async fn get_volume(&self, zone: ZoneId) -> Result<i32> {
        self.check_zone(zone)?;
        let reply = self.query(&commands::cmd_read_volume(zone)).await?;
        let volume = commands::parse_volume_response(&reply, self.dialect);
        if volume < 0 {
            debug!(%zone, reply = %reply, "Could not decode volume reply");
        }
        Ok(volume)
    }

    async fn set_bass(&self, zone: ZoneId, level: u8) -> Result<()> {
        self.check_zone(zone)?;
        commands::validate_tone(level, self.dialect)?;
        self.write(&commands::cmd_set_bass(zone, level, self.dialect))
            .await
    }

    async fn get_bass(&self, zone: ZoneId) -> Result<i32> {
        self.check_zone(zone)?;
        self.require_legacy("bass read-back")?;
        let reply = self.query(&commands::cmd_read_bass(zone)).await?;
        Ok(commands::parse_tone_response(&reply))
    }

    async fn set_treble(&self, zone: ZoneId, level: u8) -> Result<()> {
        self.check_zone(zone)?;
        commands::validate_tone(level, self.dialect)?;
        self.write(&commands::cmd_set_treble(zone, level, self.dialect))
            .await
    }

    async fn get_treble(&self, zone: ZoneId) -> Result<i32> {
        self.check_zone(zone)?;
        self.require_legacy("treble read-back")?;
        let reply = self.query(&commands::cmd_read_treble(zone)).await?;
        Ok(commands::parse_tone_response(&reply))
    }

    async fn link(&self, input: InputId, output: ZoneId) -> Result<()> {
        self.check_zone(output)?;
        self.check_input(input)?;
        self.write(&commands::cmd_link(input, output)).await
    }
}

#[async_trait]
impl Probe for Ae6mcAmplifier {
    /// Version query. Any reply line counts, including a failure trailer:
    /// the device answered.
    async fn active_probe(&self) -> Result<String> {
        self.line.query(&commands::cmd_read_version()).await
    }

    async fn passive_probe(&self) -> Result<String> {
        self.line.read_until_idle().await
    }
}
