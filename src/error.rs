use thiserror::Error;

/// Configuration-time failure parsing a WiFi/LAN module serial number.
/// Surfaced synchronously at setup and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidSerial {
    #[error("serial number must not be empty")]
    Empty,
    #[error("serial number {0:?} is not a decimal number")]
    NotNumeric(String),
    #[error("serial number must be non-zero and fit in 32 bits")]
    OutOfRange,
}

/// A response frame that could not be decoded. Decoding is otherwise total:
/// garbage bytes become (implausible) numbers, never a crash.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("response too short: {got} bytes, need at least {needed}")]
    TooShort { needed: usize, got: usize },

    #[error("response checksum mismatch: frame {expected:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { expected: u8, computed: u8 },
}

/// A failure on a connection the inverter did accept. Retried on the next
/// scheduled cycle; escalated to Offline only after a consecutive-failure
/// threshold. Distinct from a connect failure, which means the device is
/// powered down (routine overnight).
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("read timed out with no data after {0} seconds")]
    ReadTimeout(u64),

    #[error("i/o error after connect: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
