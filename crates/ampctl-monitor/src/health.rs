//! Liveness state machine for the amplifier link.
//!
//! The monitor polls on a fixed period, independent of request traffic:
//!
//! | State   | Probe                       | Outcome                                   |
//! |---------|-----------------------------|-------------------------------------------|
//! | `Alive` | active (version query)      | non-empty reply: stay `Alive`             |
//! | `Alive` | active fails / times out    | `Dead`                                    |
//! | `Dead`  | passive (idle read)         | data: replay state, `Alive` on success    |
//! | `Dead`  | passive returns nothing     | stay `Dead`                               |
//!
//! The dead-state probe never writes: pushing commands at a device that is
//! down can stall the line or corrupt framing, while listening is free.
//! When the amplifier powers back up it emits a banner/trailer on its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use ampctl_core::error::Result;
use ampctl_core::events::AmpEvent;
use ampctl_core::types::LivenessState;

use crate::replay::RecoveryReplay;

/// Default polling period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(15);

/// Shortest polling period accepted; shorter requests are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// The two probes the monitor needs from a device driver.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Cheap query that writes to the device, used while it is presumed alive.
    async fn active_probe(&self) -> Result<String>;

    /// Read-only probe used while the device is presumed dead.
    async fn passive_probe(&self) -> Result<String>;
}

/// Liveness monitor for one amplifier.
pub struct HealthMonitor {
    probe: Arc<dyn Probe>,
    replay: Arc<dyn RecoveryReplay>,
    period: Duration,
    state: LivenessState,
    state_tx: watch::Sender<LivenessState>,
    event_tx: broadcast::Sender<AmpEvent>,
}

impl HealthMonitor {
    /// Create a monitor in the `Alive` state with the default period.
    pub fn new(probe: Arc<dyn Probe>, replay: Arc<dyn RecoveryReplay>) -> Self {
        let (state_tx, _) = watch::channel(LivenessState::Alive);
        let (event_tx, _) = broadcast::channel(64);
        HealthMonitor {
            probe,
            replay,
            period: DEFAULT_PERIOD,
            state: LivenessState::Alive,
            state_tx,
            event_tx,
        }
    }

    /// Override the polling period.
    ///
    /// Periods below [`MIN_PERIOD`] (including zero) are raised to it.
    pub fn with_period(mut self, period: Duration) -> Self {
        if period < MIN_PERIOD {
            warn!(requested = ?period, min = ?MIN_PERIOD, "Monitor period too short, using minimum");
        }
        self.period = period.max(MIN_PERIOD);
        self
    }

    /// The polling period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Current liveness state.
    pub fn state(&self) -> LivenessState {
        self.state
    }

    /// Subscribe to link events.
    pub fn subscribe(&self) -> broadcast::Receiver<AmpEvent> {
        self.event_tx.subscribe()
    }

    /// Run one probe and apply the resulting transition.
    ///
    /// Errors from the probes and the replay are logged and folded into
    /// the state; nothing propagates.
    pub async fn tick(&mut self) -> LivenessState {
        match self.state {
            LivenessState::Alive => self.check_alive().await,
            LivenessState::Dead => self.check_dead().await,
        }
        self.state
    }

    async fn check_alive(&mut self) {
        trace!("Probing amplifier version");
        match self.probe.active_probe().await {
            Ok(reply) if !reply.is_empty() => {
                trace!(reply = %reply, "Amplifier is responding");
            }
            Ok(_) => {
                info!("The amplifier returned an empty reply, marking it dead");
                self.mark_lost();
            }
            Err(e) => {
                info!(error = %e, "The amplifier just stopped responding");
                self.mark_lost();
            }
        }
    }

    async fn check_dead(&mut self) {
        trace!("Listening for the amplifier");
        let data = match self.probe.passive_probe().await {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "Passive probe failed");
                return;
            }
        };

        if data.is_empty() {
            trace!("Amplifier still silent");
            return;
        }

        debug!(data = %data, "Amplifier is talking again");
        info!("Replaying zone state to the amplifier");
        let _ = self.event_tx.send(AmpEvent::RecoveryStarted);

        match self.replay.replay().await {
            Ok(()) => {
                self.transition(LivenessState::Alive);
                let _ = self.event_tx.send(AmpEvent::LinkRestored);
            }
            Err(e) => {
                warn!(error = %e, "Replaying zone state did not work, retrying next tick");
                let _ = self.event_tx.send(AmpEvent::RecoveryFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn mark_lost(&mut self) {
        self.transition(LivenessState::Dead);
        let _ = self.event_tx.send(AmpEvent::LinkLost);
    }

    fn transition(&mut self, to: LivenessState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        info!(%from, %to, "Amplifier liveness changed");
        self.state = to;
        self.state_tx.send_replace(to);
        let _ = self.event_tx.send(AmpEvent::LivenessChanged { from, to });
    }

    /// Move the monitor onto its own task. The first probe runs immediately.
    pub fn spawn(self) -> MonitorHandle {
        let cancel = CancellationToken::new();
        let state_rx = self.state_tx.subscribe();
        let event_tx = self.event_tx.clone();
        let task = tokio::spawn(self.run(cancel.clone()));

        MonitorHandle {
            cancel,
            task,
            state_rx,
            event_tx,
        }
    }

    async fn run(mut self, cancel: CancellationToken) -> Self {
        info!(period = ?self.period, "Health monitor started");
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Health monitor stopping");
                    break;
                }

                _ = interval.tick() => {
                    let state = self.tick().await;
                    debug!(%state, "Health check done");
                }
            }
        }
        self
    }
}

/// Handle to a spawned [`HealthMonitor`].
///
/// Dropping the handle detaches the task; call
/// [`shutdown`](MonitorHandle::shutdown) to stop it.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<HealthMonitor>,
    state_rx: watch::Receiver<LivenessState>,
    event_tx: broadcast::Sender<AmpEvent>,
}

impl MonitorHandle {
    /// Latest liveness state published by the monitor.
    pub fn state(&self) -> LivenessState {
        *self.state_rx.borrow()
    }

    /// Watch channel that changes whenever the liveness state does.
    pub fn watch(&self) -> watch::Receiver<LivenessState> {
        self.state_rx.clone()
    }

    /// Subscribe to link events.
    pub fn subscribe(&self) -> broadcast::Receiver<AmpEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the loop after the in-flight probe finishes and return the monitor.
    ///
    /// Returns `None` if the task panicked.
    pub async fn shutdown(self) -> Option<HealthMonitor> {
        self.cancel.cancel();
        match self.task.await {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                warn!(error = %e, "Health monitor task ended abnormally");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ampctl_core::error::Error;

    /// Probe returning scripted results; once a script runs dry it repeats
    /// the fallback.
    struct ScriptedProbe {
        active: Mutex<VecDeque<Result<String>>>,
        passive: Mutex<VecDeque<Result<String>>>,
        active_fallback: fn() -> Result<String>,
        passive_fallback: fn() -> Result<String>,
        active_calls: AtomicUsize,
        passive_calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(active_fallback: fn() -> Result<String>, passive_fallback: fn() -> Result<String>) -> Self {
            ScriptedProbe {
                active: Mutex::new(VecDeque::new()),
                passive: Mutex::new(VecDeque::new()),
                active_fallback,
                passive_fallback,
                active_calls: AtomicUsize::new(0),
                passive_calls: AtomicUsize::new(0),
            }
        }

        fn push_passive(&self, result: Result<String>) {
            self.passive.lock().unwrap().push_back(result);
        }

        fn push_active(&self, result: Result<String>) {
            self.active.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn active_probe(&self) -> Result<String> {
            self.active_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.active.lock().unwrap().pop_front();
            next.unwrap_or_else(self.active_fallback)
        }

        async fn passive_probe(&self) -> Result<String> {
            self.passive_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.passive.lock().unwrap().pop_front();
            next.unwrap_or_else(self.passive_fallback)
        }
    }

    fn version() -> Result<String> {
        Ok("AE6MC 2.04".into())
    }

    fn timeout() -> Result<String> {
        Err(Error::Timeout)
    }

    fn silence() -> Result<String> {
        Ok(String::new())
    }

    fn counting_replay(count: Arc<AtomicUsize>) -> Arc<dyn RecoveryReplay> {
        Arc::new(move || {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn stays_alive_while_version_answers() {
        let probe = Arc::new(ScriptedProbe::new(version, silence));
        let replays = Arc::new(AtomicUsize::new(0));
        let mut monitor = HealthMonitor::new(probe.clone(), counting_replay(replays.clone()));

        for _ in 0..5 {
            assert_eq!(monitor.tick().await, LivenessState::Alive);
        }
        assert_eq!(probe.active_calls.load(Ordering::SeqCst), 5);
        assert_eq!(probe.passive_calls.load(Ordering::SeqCst), 0);
        assert_eq!(replays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_probes_leave_dead_and_switch_to_passive() {
        let probe = Arc::new(ScriptedProbe::new(timeout, silence));
        let replays = Arc::new(AtomicUsize::new(0));
        let mut monitor = HealthMonitor::new(probe.clone(), counting_replay(replays.clone()));

        for _ in 0..4 {
            assert_eq!(monitor.tick().await, LivenessState::Dead);
        }
        // Only the first tick writes; the rest listen.
        assert_eq!(probe.active_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.passive_calls.load(Ordering::SeqCst), 3);
        assert_eq!(replays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_version_reply_counts_as_failure() {
        let probe = Arc::new(ScriptedProbe::new(silence, silence));
        let mut monitor =
            HealthMonitor::new(probe, counting_replay(Arc::new(AtomicUsize::new(0))));
        assert_eq!(monitor.tick().await, LivenessState::Dead);
    }

    #[tokio::test]
    async fn passive_probe_error_stays_dead() {
        let probe = Arc::new(ScriptedProbe::new(timeout, || {
            Err(Error::Connectivity("port gone".into()))
        }));
        let replays = Arc::new(AtomicUsize::new(0));
        let mut monitor = HealthMonitor::new(probe, counting_replay(replays.clone()));

        monitor.tick().await;
        assert_eq!(monitor.tick().await, LivenessState::Dead);
        assert_eq!(replays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn recovery_replays_exactly_once() {
        let probe = Arc::new(ScriptedProbe::new(version, silence));
        probe.push_active(Err(Error::Timeout));
        probe.push_passive(Ok(String::new()));
        probe.push_passive(Ok("Error 1: No ~ detected".into()));
        let replays = Arc::new(AtomicUsize::new(0));
        let mut monitor = HealthMonitor::new(probe.clone(), counting_replay(replays.clone()));

        assert_eq!(monitor.tick().await, LivenessState::Dead);
        assert_eq!(monitor.tick().await, LivenessState::Dead);
        assert_eq!(monitor.tick().await, LivenessState::Alive);
        assert_eq!(replays.load(Ordering::SeqCst), 1);

        for _ in 0..3 {
            assert_eq!(monitor.tick().await, LivenessState::Alive);
        }
        assert_eq!(replays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_replay_retries_next_tick() {
        let probe = Arc::new(ScriptedProbe::new(version, || Ok("boot".into())));
        probe.push_active(Err(Error::Timeout));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let replay: Arc<dyn RecoveryReplay> = Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::Connectivity("write failed".into()))
                } else {
                    Ok(())
                }
            }
        });
        let mut monitor = HealthMonitor::new(probe, replay);

        assert_eq!(monitor.tick().await, LivenessState::Dead);
        assert_eq!(monitor.tick().await, LivenessState::Dead);
        assert_eq!(monitor.tick().await, LivenessState::Alive);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn events_follow_transitions() {
        let probe = Arc::new(ScriptedProbe::new(version, || Ok("boot".into())));
        probe.push_active(Err(Error::Timeout));
        let mut monitor =
            HealthMonitor::new(probe, counting_replay(Arc::new(AtomicUsize::new(0))));
        let mut events = monitor.subscribe();

        monitor.tick().await;
        monitor.tick().await;

        let expected = [
            AmpEvent::LivenessChanged {
                from: LivenessState::Alive,
                to: LivenessState::Dead,
            },
            AmpEvent::LinkLost,
            AmpEvent::RecoveryStarted,
            AmpEvent::LivenessChanged {
                from: LivenessState::Dead,
                to: LivenessState::Alive,
            },
            AmpEvent::LinkRestored,
        ];
        for want in expected {
            assert_eq!(events.try_recv().unwrap(), want);
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_raised_to_minimum_and_loop_runs() {
        let probe = Arc::new(ScriptedProbe::new(version, silence));
        let monitor = HealthMonitor::new(
            probe.clone(),
            counting_replay(Arc::new(AtomicUsize::new(0))),
        )
        .with_period(Duration::ZERO);
        assert_eq!(monitor.period(), MIN_PERIOD);

        let handle = monitor.spawn();
        tokio::time::sleep(MIN_PERIOD * 2 + Duration::from_millis(500)).await;
        assert_eq!(probe.active_calls.load(Ordering::SeqCst), 3);

        let monitor = handle.shutdown().await.unwrap();
        assert_eq!(monitor.state(), LivenessState::Alive);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_ticks_on_period_and_shuts_down() {
        let probe = Arc::new(ScriptedProbe::new(timeout, silence));
        let monitor = HealthMonitor::new(
            probe.clone(),
            counting_replay(Arc::new(AtomicUsize::new(0))),
        );
        assert_eq!(monitor.period(), DEFAULT_PERIOD);

        let handle = monitor.spawn();
        let mut watch = handle.watch();
        watch.changed().await.unwrap();
        assert_eq!(handle.state(), LivenessState::Dead);

        // First tick ran at t=0; two more by t=31s.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(probe.active_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.passive_calls.load(Ordering::SeqCst), 2);

        let monitor = handle.shutdown().await.unwrap();
        assert_eq!(monitor.state(), LivenessState::Dead);
    }
}
