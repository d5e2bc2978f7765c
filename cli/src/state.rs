// Zone state file: the last known state of every zone, as a TOML array.
//
//   [[zone]]
//   id = 0
//   volume = 40
//   bass = 7
//   treble = 7
//   on = true
//   linked_input = 2
//
// The file is re-read on every replay, so whatever keeps it up to date can
// do so while the monitor runs.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ampctl::monitor::ZoneStateSource;
use ampctl::{AmplifierInfo, ZoneState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default, rename = "zone")]
    pub zones: Vec<ZoneState>,
}

impl StateFile {
    pub fn parse(content: &str) -> Result<Self> {
        let mut file: Self = toml::from_str(content)?;
        file.zones.sort_by_key(|z| z.id);
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read zone states from {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse zone states from {}", path.display()))
    }

    /// Check ids against the amplifier's sizes and its dialect's tone range.
    pub fn validate(&self, info: &AmplifierInfo) -> Result<()> {
        let mut seen = HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.id) {
                bail!("{} appears more than once", zone.id);
            }
            if zone.id.index() >= info.outputs {
                bail!("{} does not exist on a {}", zone.id, info.model_name);
            }
            if let Some(input) = zone.linked_input {
                if input.index() >= info.inputs {
                    bail!("{}: {input} does not exist on a {}", zone.id, info.model_name);
                }
            }
            if zone.volume > 100 {
                bail!("{}: volume {} is above 100", zone.id, zone.volume);
            }
            let max = info.dialect.max_tone_level();
            if zone.bass > max || zone.treble > max {
                bail!(
                    "{}: tone levels must be 0-{max} for {} firmware",
                    zone.id,
                    info.dialect
                );
            }
        }
        Ok(())
    }
}

/// [`ZoneStateSource`] backed by a state file on disk.
pub struct FileZoneSource {
    path: PathBuf,
}

impl FileZoneSource {
    pub fn new(path: PathBuf) -> Self {
        FileZoneSource { path }
    }
}

#[async_trait]
impl ZoneStateSource for FileZoneSource {
    async fn zone_states(&self) -> ampctl::Result<Vec<ZoneState>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let file = StateFile::parse(&content).map_err(|e| {
            ampctl::Error::InvalidParameter(format!("{}: {e:#}", self.path.display()))
        })?;
        tracing::debug!(path = %self.path.display(), zones = file.zones.len(), "Zone states read");
        Ok(file.zones)
    }
}
