use alloy::primitives::B256;
use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value};

use crate::decoding::prefixed_hex;

/// One event ready for a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub event_name: String,
    /// Block timestamp in unix seconds.
    pub timestamp: u64,
    pub block_number: u64,
    pub block_hash: B256,
    /// Event arguments after coercion, keyed by argument name.
    pub fields: Map<String, Value>,
    pub distinct_id: Option<Value>,
}

impl NormalizedRecord {
    pub fn timestamp_rfc3339(&self) -> Option<String> {
        let secs = i64::try_from(self.timestamp).ok()?;
        DateTime::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Flat property map: base fields first, then arguments, then
    /// `distinct_id` when one was marked.
    pub fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        let timestamp = self
            .timestamp_rfc3339()
            .map(Value::String)
            .unwrap_or_else(|| Value::from(self.timestamp));
        props.insert("$timestamp".to_string(), timestamp);
        props.insert("blockNumber".to_string(), Value::from(self.block_number));
        props.insert("blockHash".to_string(), Value::String(prefixed_hex(self.block_hash.as_slice())));

        for (name, value) in &self.fields {
            props.insert(name.clone(), value.clone());
        }

        if let Some(id) = &self.distinct_id {
            props.insert("distinct_id".to_string(), id.clone());
        }

        props
    }
}
