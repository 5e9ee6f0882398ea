use crate::prelude::*;

use serde::Deserialize;
use std::sync::{Arc, Mutex};

/// Floor for the polling interval so a misconfiguration can't hammer the
/// inverter's WiFi module, which is easily overwhelmed.
pub const MIN_SCAN_INTERVAL: u64 = 5;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverters: Vec<Inverter>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Inverter {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub name: String,
    pub host: String,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    #[serde(deserialize_with = "de_serial")]
    pub serial: Serial,

    /// Seconds between poll cycles.
    #[serde(default = "Config::default_scan_interval")]
    pub scan_interval: u64,
    /// Connect/read timeout in seconds.
    #[serde(default = "Config::default_timeout")]
    pub timeout: u64,
    /// Consecutive transient failures before the inverter is shown Offline.
    #[serde(default = "Config::default_offline_threshold")]
    pub offline_threshold: u32,

    /// Which catalog fields to surface downstream. Decoding always covers
    /// the whole catalog; this only filters what subscribers see.
    pub sensors: Option<Vec<String>>,
}

impl Inverter {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn serial(&self) -> Serial {
        self.serial
    }

    pub fn scan_interval(&self) -> u64 {
        self.scan_interval
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn offline_threshold(&self) -> u32 {
        self.offline_threshold
    }

    pub fn sensors(&self) -> Option<&[String]> {
        self.sensors.as_deref()
    }
} // }}}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(file)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    pub fn inverters(&self) -> Vec<Inverter> {
        self.config.lock().unwrap().inverters.clone()
    }

    pub fn enabled_inverters(&self) -> Vec<Inverter> {
        self.inverters().into_iter().filter(|i| i.enabled()).collect()
    }

    pub fn inverter_with_name(&self, name: &str) -> Option<Inverter> {
        self.inverters().into_iter().find(|i| i.name() == name)
    }

    pub fn loglevel(&self) -> String {
        self.config.lock().unwrap().loglevel.clone()
    }

    /// Update an inverter's polling interval at runtime. Picked up by its
    /// coordinator when the next cycle is scheduled; no restart needed.
    pub fn set_scan_interval(&self, name: &str, scan_interval: u64) -> Result<()> {
        if scan_interval < MIN_SCAN_INTERVAL {
            bail!("scan_interval must be at least {MIN_SCAN_INTERVAL}s");
        }
        let mut config = self.config.lock().unwrap();
        for inverter in &mut config.inverters {
            if inverter.name == name {
                info!(
                    "inverter {}: scan_interval {} -> {}",
                    name, inverter.scan_interval, scan_interval
                );
                inverter.scan_interval = scan_interval;
                return Ok(());
            }
        }
        bail!("no inverter named {}", name);
    }

    /// Change which fields are surfaced downstream at runtime.
    pub fn set_sensors(&self, name: &str, sensors: Vec<String>) -> Result<()> {
        for sensor in &sensors {
            if !known_sensor(sensor) {
                bail!("unknown sensor {}", sensor);
            }
        }
        let mut config = self.config.lock().unwrap();
        for inverter in &mut config.inverters {
            if inverter.name == name {
                inverter.sensors = Some(sensors);
                return Ok(());
            }
        }
        bail!("no inverter named {}", name);
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.inverters.is_empty() {
            bail!("at least one inverter must be configured");
        }

        for (i, inv) in self.inverters.iter().enumerate() {
            if inv.name.is_empty() {
                bail!("inverter[{}].name must not be empty", i);
            }
            if inv.host.is_empty() {
                bail!("inverter[{}].host must not be empty", i);
            }
            if inv.port == 0 {
                bail!("inverter[{}].port must be between 1 and 65535", i);
            }
            if inv.scan_interval < MIN_SCAN_INTERVAL {
                bail!(
                    "inverter[{}].scan_interval must be at least {}s",
                    i,
                    MIN_SCAN_INTERVAL
                );
            }
            if inv.timeout == 0 {
                bail!("inverter[{}].timeout must be at least 1s", i);
            }
            if let Some(sensors) = inv.sensors() {
                for sensor in sensors {
                    if !known_sensor(sensor) {
                        bail!("inverter[{}]: unknown sensor {}", i, sensor);
                    }
                }
            }
        }

        Ok(())
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_port() -> u16 {
        8899
    }

    fn default_scan_interval() -> u64 {
        30
    }

    fn default_timeout() -> u64 {
        10
    }

    fn default_offline_threshold() -> u32 {
        3
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

// "status" and "invertersn" live on the Sample itself rather than in the
// numeric field catalog, but are selectable all the same.
fn known_sensor(name: &str) -> bool {
    name == "status" || name == "invertersn" || trannergy::catalog::lookup(name).is_some()
}

fn de_serial<'de, D>(deserializer: D) -> Result<Serial, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Serial::from_str(&s).map_err(serde::de::Error::custom)
}
