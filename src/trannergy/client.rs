use crate::prelude::*;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::frame;

const MAX_RESPONSE_SIZE: usize = 4096;

// Above this the "temperature" is the WiFi module making numbers up while
// the inverter itself is powered down.
const MAX_PLAUSIBLE_TEMP: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Online,
    Offline,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Online => write!(f, "Online"),
            Status::Offline => write!(f, "Offline"),
        }
    }
}

/// One successfully decoded poll, as handed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub values: HashMap<&'static str, f64>,
    pub inverter_sn: Option<String>,
    pub status: Status,
}

/// Result of one poll cycle, consumed immediately by the coordinator.
#[derive(Debug)]
pub enum PollOutcome {
    Success(Sample),
    /// The inverter accepted the connection but the exchange failed.
    TransientFailure(TransientError),
    /// The inverter is unreachable or asleep. Routine overnight; never an
    /// error.
    DeviceOffline,
}

/// Owns a single TCP connection attempt per poll cycle: connect with
/// timeout, send the query, read the response, close. No retries here;
/// retry policy belongs to the coordinator.
#[derive(Clone)]
pub struct Client {
    config: ConfigWrapper,
    name: String,
}

impl Client {
    pub fn new(config: ConfigWrapper, inverter: &config::Inverter) -> Self {
        Self {
            config,
            name: inverter.name().to_string(),
        }
    }

    fn inverter(&self) -> config::Inverter {
        self.config
            .inverter_with_name(&self.name)
            .expect("can't find my inverter")
    }

    pub async fn poll(&self) -> PollOutcome {
        let inverter = self.inverter();
        let timeout = Duration::from_secs(inverter.timeout());

        let addr = (inverter.host().to_owned(), inverter.port());
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(
                    "inverter {}: could not connect to {}:{}: {}",
                    self.name,
                    inverter.host(),
                    inverter.port(),
                    e
                );
                return PollOutcome::DeviceOffline;
            }
            Err(_) => {
                debug!(
                    "inverter {}: connect timeout to {}:{} after {}s",
                    self.name,
                    inverter.host(),
                    inverter.port(),
                    inverter.timeout()
                );
                return PollOutcome::DeviceOffline;
            }
        };

        // The stream is dropped (and the socket closed) on every path out
        // of exchange, including cancellation of the whole poll.
        let raw = match self.exchange(stream, &inverter, timeout).await {
            Ok(raw) => raw,
            Err(e) => return PollOutcome::TransientFailure(e),
        };

        if raw.is_empty() {
            // Module accepted the connection but had nothing to say; the
            // inverter side is asleep.
            debug!("inverter {}: empty response", self.name);
            return PollOutcome::DeviceOffline;
        }

        let decoded = match frame::decode(&raw) {
            Ok(decoded) => decoded,
            Err(e) => return PollOutcome::TransientFailure(e.into()),
        };

        match decoded.value("temperature") {
            Some(t) if t <= MAX_PLAUSIBLE_TEMP => {}
            t => {
                debug!(
                    "inverter {}: junk frame while asleep (temperature: {:?})",
                    self.name, t
                );
                return PollOutcome::DeviceOffline;
            }
        }

        let mut values = decoded.values;
        let mut inverter_sn = decoded.inverter_sn;
        if let Some(sensors) = inverter.sensors() {
            values.retain(|name, _| sensors.iter().any(|s| s == name));
            if !sensors.iter().any(|s| s == "invertersn") {
                inverter_sn = None;
            }
        }

        PollOutcome::Success(Sample {
            timestamp: Utc::now(),
            values,
            inverter_sn,
            status: Status::Online,
        })
    }

    async fn exchange(
        &self,
        mut stream: TcpStream,
        inverter: &config::Inverter,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransientError> {
        let query = frame::build_query(inverter.serial());
        stream.write_all(&query).await?;
        stream.flush().await?;

        // Read until the module closes the connection or the deadline
        // passes, whichever first. The module usually sends one frame and
        // closes.
        let deadline = tokio::time::Instant::now() + timeout;
        let mut buf = BytesMut::with_capacity(1024);
        loop {
            if buf.len() >= MAX_RESPONSE_SIZE {
                break;
            }
            match tokio::time::timeout_at(deadline, stream.read_buf(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    if buf.is_empty() {
                        return Err(TransientError::ReadTimeout(inverter.timeout()));
                    }
                    // Deadline hit but we did receive a frame; decode what
                    // we have.
                    break;
                }
            }
        }

        Ok(buf.to_vec())
    }
}
