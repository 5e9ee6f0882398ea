use crate::prelude::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::trannergy::client::{Client, PollOutcome, Sample, Status};

/// Availability as shown to subscribers. `Unknown` only before the first
/// poll completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Availability {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Unknown => write!(f, "Unknown"),
            Availability::Online => write!(f, "Online"),
            Availability::Offline => write!(f, "Offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    /// A fresh decoded sample for the named inverter.
    Sample(String, Sample),
    /// The named inverter's availability changed.
    Availability(String, Availability),
    Shutdown,
}

// PollStats {{{
#[derive(Default)]
pub struct PollStats {
    pub cycles: u64,
    pub successes: u64,
    pub transient_failures: u64,
    pub offline_cycles: u64,
    pub last_success: Option<DateTime<Utc>>,
}

impl PollStats {
    pub fn print_summary(&self, name: &str) {
        info!("Poll statistics for {}:", name);
        info!("  Cycles: {}", self.cycles);
        info!("  Successes: {}", self.successes);
        info!("  Transient failures: {}", self.transient_failures);
        info!("  Offline cycles: {}", self.offline_cycles);
        if let Some(t) = self.last_success {
            info!("  Last success: {}", t.format("%Y-%m-%dT%H:%M:%S"));
        }
    }
} // }}}

#[derive(Default)]
struct State {
    availability: Availability,
    /// Most recent successfully decoded sample, retained across Offline so
    /// consumers keep displaying the last good figures.
    last_sample: Option<Sample>,
    consecutive_transient: u32,
}

/// Drives periodic polling for one inverter: schedules cycles, classifies
/// outcomes, owns the availability state machine and the last-known-good
/// sample, and fans updates out to subscribers. Each configured inverter
/// gets its own coordinator; nothing is shared between them.
#[derive(Clone)]
pub struct Coordinator {
    config: ConfigWrapper,
    name: String,
    client: Client,
    channels: Channels,
    state: Arc<Mutex<State>>,
    pub stats: Arc<Mutex<PollStats>>,
}

impl Coordinator {
    pub fn new(config: ConfigWrapper, inverter: &config::Inverter, channels: Channels) -> Self {
        Self {
            client: Client::new(config.clone(), inverter),
            config,
            name: inverter.name().to_string(),
            channels,
            state: Arc::new(Mutex::new(State::default())),
            stats: Arc::new(Mutex::new(PollStats::default())),
        }
    }

    fn inverter(&self) -> config::Inverter {
        self.config
            .inverter_with_name(&self.name)
            .expect("can't find my inverter")
    }

    /// Runs the poll loop until shutdown. Cycles are strictly sequential:
    /// the next one is scheduled only after the current one finishes, so
    /// the configured interval is a floor, not a guarantee.
    pub async fn start(&self) -> Result<()> {
        let mut shutdown_rx = self.channels.to_coordinator.subscribe();

        loop {
            tokio::select! {
                outcome = self.client.poll() => self.apply(outcome),
                // Dropping the poll future closes the in-flight socket.
                msg = shutdown_rx.recv() => {
                    if matches!(msg, Ok(ChannelData::Shutdown) | Err(_)) {
                        break;
                    }
                }
            }

            // Re-read each cycle so scan_interval can change at runtime
            // without recreating the coordinator.
            let interval = self.inverter().scan_interval();
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                msg = shutdown_rx.recv() => {
                    if matches!(msg, Ok(ChannelData::Shutdown) | Err(_)) {
                        break;
                    }
                }
            }
        }

        info!("inverter {}: coordinator exiting", self.name);
        self.stats.lock().unwrap().print_summary(&self.name);
        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.to_coordinator.send(ChannelData::Shutdown);
    }

    pub fn current_sample(&self) -> Option<Sample> {
        self.state.lock().unwrap().last_sample.clone()
    }

    pub fn availability(&self) -> Availability {
        self.state.lock().unwrap().availability
    }

    /// Applies one poll outcome to the availability state machine and
    /// notifies subscribers. Never fails: a bad cycle must not take the
    /// scheduler down with it.
    pub fn apply(&self, outcome: PollOutcome) {
        let threshold = self.inverter().offline_threshold();
        let mut state = self.state.lock().unwrap();
        self.stats.lock().unwrap().cycles += 1;

        match outcome {
            PollOutcome::Success(sample) => {
                {
                    let mut stats = self.stats.lock().unwrap();
                    stats.successes += 1;
                    stats.last_success = Some(sample.timestamp);
                }
                state.consecutive_transient = 0;
                let was = state.availability;
                state.availability = Availability::Online;
                // Single atomic replace; readers only ever see a
                // fully-formed sample.
                state.last_sample = Some(sample.clone());
                drop(state);

                let _ = self
                    .channels
                    .from_coordinator
                    .send(ChannelData::Sample(self.name.clone(), sample));
                if was != Availability::Online {
                    info!("inverter {}: {} -> Online", self.name, was);
                    let _ = self.channels.from_coordinator.send(ChannelData::Availability(
                        self.name.clone(),
                        Availability::Online,
                    ));
                }
            }
            PollOutcome::DeviceOffline => {
                self.stats.lock().unwrap().offline_cycles += 1;
                self.mark_offline(state);
            }
            PollOutcome::TransientFailure(e) => {
                self.stats.lock().unwrap().transient_failures += 1;
                state.consecutive_transient += 1;
                warn!(
                    "inverter {}: poll failed ({} consecutive): {}",
                    self.name, state.consecutive_transient, e
                );
                if state.consecutive_transient >= threshold {
                    // Enough in a row; treat like the device going away.
                    self.mark_offline(state);
                }
                // Below threshold: state unchanged, subscribers not told.
                // One dropped packet must not flap availability.
            }
        }
    }

    fn mark_offline(&self, mut state: std::sync::MutexGuard<'_, State>) {
        let was = state.availability;
        state.availability = Availability::Offline;
        if let Some(sample) = state.last_sample.as_mut() {
            sample.status = Status::Offline;
        }
        drop(state);

        if was != Availability::Offline {
            info!("inverter {}: {} -> Offline", self.name, was);
            let _ = self.channels.from_coordinator.send(ChannelData::Availability(
                self.name.clone(),
                Availability::Offline,
            ));
        } else {
            debug!("inverter {}: still offline", self.name);
        }
    }
}
