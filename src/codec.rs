//! Value Codecs
//!
//! Serialize/deserialize hooks between a cached value type and the JSON
//! form stored in tier 2 and tier 3.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;

use crate::error::CodecError;

/// Converts cached values to and from their stored JSON form
pub trait ValueCodec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Value, CodecError>;

    fn decode(&self, stored: Value) -> Result<T, CodecError>;
}

/// Codec for any serde-compatible type
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> ValueCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Value, CodecError> {
        Ok(serde_json::to_value(value)?)
    }

    fn decode(&self, stored: Value) -> Result<T, CodecError> {
        Ok(serde_json::from_value(stored)?)
    }
}
