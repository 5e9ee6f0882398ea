#![allow(dead_code)]

use trannergy_bridge::prelude::*;
use trannergy_bridge::trannergy::catalog;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory();

impl Factory {
    pub fn serial() -> Serial {
        Serial::new(1612345603).unwrap()
    }

    pub fn inverter() -> config::Inverter {
        config::Inverter {
            enabled: true,
            name: "roof".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8899,
            serial: Self::serial(),
            scan_interval: 30,
            timeout: 10,
            offline_threshold: 3,
            sensors: None,
        }
    }

    pub fn config_wrapper(inverter: config::Inverter) -> ConfigWrapper {
        ConfigWrapper::from_config(Config {
            inverters: vec![inverter],
            loglevel: "debug".to_string(),
        })
    }
}

/// Builds synthetic status responses with known raw field values.
pub struct ResponseBuilder {
    buf: Vec<u8>,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; catalog::min_response_len()],
        }
    }

    /// Sets a field's raw (unscaled) value by catalog name.
    pub fn field(mut self, name: &str, raw: u32) -> Self {
        let spec = catalog::lookup(name).expect("unknown field");
        match spec.width {
            2 => self.buf[spec.offset..spec.offset + 2]
                .copy_from_slice(&(raw as u16).to_be_bytes()),
            4 => self.buf[spec.offset..spec.offset + 4].copy_from_slice(&raw.to_be_bytes()),
            _ => panic!("unexpected width"),
        }
        self
    }

    pub fn inverter_sn(mut self, sn: &str) -> Self {
        let range = catalog::INVERTER_SN_RANGE;
        let bytes = sn.as_bytes();
        assert!(bytes.len() <= range.end - range.start);
        self.buf[range.start..range.start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }

    /// Appends the mod-256 checksum and the 0x16 end marker.
    pub fn build_with_checksum(self) -> Vec<u8> {
        let mut buf = self.buf;
        let checksum = buf.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        buf.push(checksum);
        buf.push(0x16);
        buf
    }
}

/// A response that decodes to a daytime sample: plausible temperature,
/// actualpower 1530 W, energytoday 12.4 kWh, energytotal 1234.5 kWh.
pub fn daytime_response() -> Vec<u8> {
    ResponseBuilder::new()
        .field("temperature", 412)
        .field("actualpower", 1530)
        .field("energytoday", 1240)
        .field("energytotal", 12345)
        .field("hourstotal", 7766)
        .inverter_sn("TRN5500XT012345")
        .build()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
