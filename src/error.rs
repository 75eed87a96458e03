//! Error types

use thiserror::Error;

/// Structural failure while decoding a diagnostic internal-info response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("response too short: {0} bytes, need at least 3")]
    ResponseTooShort(usize),

    #[error("truncated record header at offset {offset}: {remaining} bytes left")]
    TruncatedHeader { offset: usize, remaining: usize },

    #[error("record {key:#06x} at offset {offset} declares {length} bytes, only {remaining} left")]
    LengthOverrun {
        key: u16,
        offset: usize,
        length: usize,
        remaining: usize,
    },

    #[error("record {key:#06x} has {length} bytes, need at least {need}")]
    FieldTooShort { key: u16, length: usize, need: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no free slot for lidar {handle:#010x}, registry holds {capacity}")]
    Full { handle: u32, capacity: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid lidar ip: {0}")]
    InvalidIp(String),

    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: i64 },
}
