//! Error Types
//!
//! Errors raised at a tier boundary. The cache engine logs these and turns
//! them into misses or no-ops; they are public so custom tiers can use them.

use thiserror::Error;

/// Value serialization failure
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Custom(String),
}

/// Failure of a single tier operation
#[derive(Error, Debug)]
pub enum TierError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid key for this tier: {0:?}")]
    InvalidKey(String),
}

impl From<serde_json::Error> for TierError {
    fn from(e: serde_json::Error) -> Self {
        TierError::Codec(CodecError::Json(e))
    }
}

pub type Result<T> = std::result::Result<T, TierError>;
