//! Re-applying persisted zone state after the amplifier comes back.

use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use ampctl_core::amplifier::Amplifier;
use ampctl_core::error::Result;
use ampctl_core::types::{ZoneId, ZoneState};

/// Action run by the health monitor on a dead-to-alive transition.
///
/// Any `Fn() -> impl Future<Output = Result<()>>` closure works as a replay.
#[async_trait]
pub trait RecoveryReplay: Send + Sync {
    async fn replay(&self) -> Result<()>;
}

#[async_trait]
impl<F, Fut> RecoveryReplay for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn replay(&self) -> Result<()> {
        (self)().await
    }
}

/// Where the last known zone states come from.
#[async_trait]
pub trait ZoneStateSource: Send + Sync {
    async fn zone_states(&self) -> Result<Vec<ZoneState>>;
}

/// In-memory [`ZoneStateSource`], updated by whoever tracks zone changes.
#[derive(Debug, Default)]
pub struct MemoryZoneSource {
    zones: RwLock<Vec<ZoneState>>,
}

impl MemoryZoneSource {
    pub fn new(zones: Vec<ZoneState>) -> Self {
        MemoryZoneSource {
            zones: RwLock::new(zones),
        }
    }

    /// Insert or replace the state of one zone.
    pub fn upsert(&self, zone: ZoneState) {
        let mut zones = self.zones.write().unwrap_or_else(|e| e.into_inner());
        match zones.iter_mut().find(|z| z.id == zone.id) {
            Some(slot) => *slot = zone,
            None => {
                zones.push(zone);
                zones.sort_by_key(|z| z.id);
            }
        }
    }

    /// Snapshot of one zone.
    pub fn get(&self, id: ZoneId) -> Option<ZoneState> {
        self.zones
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|z| z.id == id)
            .cloned()
    }
}

#[async_trait]
impl ZoneStateSource for MemoryZoneSource {
    async fn zone_states(&self) -> Result<Vec<ZoneState>> {
        Ok(self.zones.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

/// Push every zone's state back to the amplifier.
///
/// Per zone, in order: bass, treble, volume, on/off, mute, then the input
/// link if one is recorded. Stops at the first error.
pub async fn replay_zone_states(amplifier: &dyn Amplifier, zones: &[ZoneState]) -> Result<()> {
    for zone in zones {
        debug!(zone = %zone.id, "Replaying zone state");
        amplifier.set_bass(zone.id, zone.bass).await?;
        amplifier.set_treble(zone.id, zone.treble).await?;
        amplifier.set_volume(zone.id, zone.volume).await?;
        amplifier.set_on_state(zone.id, zone.on).await?;
        amplifier.set_mute_state(zone.id, zone.mute).await?;
        if let Some(input) = zone.linked_input {
            amplifier.link(input, zone.id).await?;
        }
    }
    Ok(())
}

/// The standard recovery action: read zone states from a source and
/// replay them through an amplifier.
pub struct StateReplay {
    amplifier: Arc<dyn Amplifier>,
    source: Arc<dyn ZoneStateSource>,
}

impl StateReplay {
    pub fn new(amplifier: Arc<dyn Amplifier>, source: Arc<dyn ZoneStateSource>) -> Self {
        StateReplay { amplifier, source }
    }
}

#[async_trait]
impl RecoveryReplay for StateReplay {
    async fn replay(&self) -> Result<()> {
        let zones = self.source.zone_states().await?;
        info!(zones = zones.len(), "Replaying persisted zone state");
        replay_zone_states(self.amplifier.as_ref(), &zones).await
    }
}
