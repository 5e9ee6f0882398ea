pub use crate::channels::Channels;
pub use crate::config::{self, Config, ConfigWrapper};
pub use crate::coordinator::{self, Coordinator};
pub use crate::error::{DecodeError, InvalidSerial, TransientError};
pub use crate::options::Options;
pub use crate::trannergy::{self, Serial};

pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::str::FromStr;
pub use tokio::sync::broadcast;
