//! Pluggable payload decoding.
//!
//! The log stores payloads as opaque bytes; how a payload decodes (and
//! what type it names) belongs to the application. Decoders register
//! per channel and are consulted during indexing. Channels without a
//! decoder fall into the [`RAW_TYPE`] bucket.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Type bucket used when no decoder applies or decoding fails.
pub const RAW_TYPE: &str = "raw";

/// Decodes payload bytes for one message type.
pub trait PayloadDecoder: Send + Sync {
    /// Name of the type this decoder produces.
    fn type_name(&self) -> &str;

    /// Decode one payload into a structured value.
    fn decode(&self, payload: &[u8]) -> Result<serde_json::Value>;
}

/// Per-channel decoder table.
#[derive(Default)]
pub struct DecoderRegistry {
    by_channel: HashMap<String, Arc<dyn PayloadDecoder>>,
}

impl DecoderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for a channel, replacing any previous one.
    pub fn register(&mut self, channel: impl Into<String>, decoder: Arc<dyn PayloadDecoder>) {
        self.by_channel.insert(channel.into(), decoder);
    }

    /// Decoder registered for `channel`, if any.
    #[must_use]
    pub fn get(&self, channel: &str) -> Option<&Arc<dyn PayloadDecoder>> {
        self.by_channel.get(channel)
    }
}

/// Decoder for channels carrying JSON payloads.
pub struct JsonDecoder {
    type_name: String,
}

impl JsonDecoder {
    /// Create a JSON decoder reporting `type_name`.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

impl PayloadDecoder for JsonDecoder {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn decode(&self, payload: &[u8]) -> Result<serde_json::Value> {
        serde_json::from_slice(payload).map_err(|e| Error::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        let mut registry = DecoderRegistry::new();
        registry.register("POSE", Arc::new(JsonDecoder::new("pose_t")));

        assert!(registry.get("POSE").is_some());
        assert!(registry.get("OTHER").is_none());
    }

    #[test]
    fn json_decoder_round_trip() {
        let decoder = JsonDecoder::new("status_t");
        let value = decoder.decode(br#"{"ok": true}"#).unwrap();
        assert_eq!(value["ok"], serde_json::Value::Bool(true));
        assert_eq!(decoder.type_name(), "status_t");
    }

    #[test]
    fn json_decoder_rejects_garbage() {
        let decoder = JsonDecoder::new("status_t");
        assert!(matches!(
            decoder.decode(b"\xff\xfe"),
            Err(Error::Decode { .. })
        ));
    }
}
