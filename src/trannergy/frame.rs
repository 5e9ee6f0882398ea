use bytes::BufMut;
use std::collections::HashMap;

use super::catalog::{self, FieldSpec};
use super::Serial;
use crate::error::DecodeError;

const FRAME_START: u8 = 0x68;
const FRAME_END: u8 = 0x16;
// Fixed command bytes after the start marker, then after the serial.
const QUERY_CMD: [u8; 3] = [0x02, 0x40, 0x30];
const QUERY_TRAILER: [u8; 2] = [0x01, 0x00];
// The query checksum is seeded, not a plain sum of the serial bytes.
const CHECKSUM_SEED: u32 = 115;

pub const QUERY_FRAME_LEN: usize = 16;

/// Builds the 16-byte status query for the given module serial.
///
/// Layout: `68 02 40 30` + serial little-endian twice + `01 00` + checksum
/// + `16`, where the checksum is the low byte of the seed plus the sum of
/// the eight serial bytes. Deterministic: the protocol has no session or
/// nonce handshake, so the same serial always produces the same frame.
pub fn build_query(serial: Serial) -> Vec<u8> {
    let mut frame = Vec::with_capacity(QUERY_FRAME_LEN);
    frame.put_u8(FRAME_START);
    frame.put_slice(&QUERY_CMD);
    frame.put_u32_le(serial.value());
    frame.put_u32_le(serial.value());
    frame.put_slice(&QUERY_TRAILER);

    let sum: u32 = frame[4..12].iter().map(|&b| u32::from(b)).sum();
    frame.put_u8(((CHECKSUM_SEED + sum) & 0xff) as u8);
    frame.put_u8(FRAME_END);
    frame
}

/// Everything extracted from one status response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedFrame {
    pub values: HashMap<&'static str, f64>,
    pub inverter_sn: Option<String>,
}

impl DecodedFrame {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Decodes a raw status response against the field catalog.
///
/// Fails only if the buffer is too short for the catalog's highest field or
/// if a trailing checksum is present and wrong; anything else decodes to
/// numbers. Plausibility checks (negative power, absurd temperatures) are
/// the caller's job.
pub fn decode(raw: &[u8]) -> Result<DecodedFrame, DecodeError> {
    let needed = catalog::min_response_len();
    if raw.len() < needed {
        return Err(DecodeError::TooShort {
            needed,
            got: raw.len(),
        });
    }

    // Responses that carry the 0x16 end marker have a mod-256 checksum of
    // all preceding bytes just before it. Frames without the marker have
    // been observed in the wild, so only validate when it is there.
    if raw.last() == Some(&FRAME_END) {
        let expected = raw[raw.len() - 2];
        let computed = raw[..raw.len() - 2]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_add(b));
        if expected != computed {
            return Err(DecodeError::ChecksumMismatch { expected, computed });
        }
    }

    let mut values = HashMap::new();
    for field in catalog::all() {
        if let Some(value) = read_field(raw, field) {
            values.insert(field.name, value);
        }
    }

    Ok(DecodedFrame {
        values,
        inverter_sn: read_inverter_sn(raw),
    })
}

fn read_field(raw: &[u8], field: &FieldSpec) -> Option<f64> {
    let bytes = &raw[field.offset..field.offset + field.width];
    let value = match (field.width, field.signed) {
        (1, false) => f64::from(bytes[0]),
        (1, true) => f64::from(bytes[0] as i8),
        (2, false) => {
            let v = u16::from_be_bytes([bytes[0], bytes[1]]);
            // 0xFFFF is the vendor's "channel not fitted" sentinel.
            if v == u16::MAX {
                return None;
            }
            f64::from(v)
        }
        (2, true) => f64::from(i16::from_be_bytes([bytes[0], bytes[1]])),
        (4, false) => f64::from(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        (4, true) => f64::from(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        _ => unreachable!("catalog widths are 1, 2 or 4"),
    };
    Some(value * field.scale)
}

fn read_inverter_sn(raw: &[u8]) -> Option<String> {
    let bytes = &raw[catalog::INVERTER_SN_RANGE];
    let s = std::str::from_utf8(bytes).ok()?.trim_matches('\0').trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
