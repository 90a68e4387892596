//! Interface schema: the contract's event fragments keyed by topic0.

use std::collections::HashMap;

use alloy::json_abi::JsonAbi;
use alloy::primitives::B256;
use serde_json::Value;
use thiserror::Error;

use super::event_parsing::{EventParseError, ParsedEvent};

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("Invalid ABI JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid event '{entry}': {source}")]
    Event {
        entry: String,
        #[source]
        source: EventParseError,
    },

    #[error("Unsupported ABI entry at index {0}: expected an object or a string")]
    UnsupportedEntry(usize),
}

/// Event fragments of one contract. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct InterfaceSchema {
    events: HashMap<B256, ParsedEvent>,
}

impl InterfaceSchema {
    /// Build from ABI entries. Entries may be JSON fragment objects or
    /// human-readable strings; anything that is not an event is ignored.
    pub fn from_json_values(entries: &[Value]) -> Result<Self, AbiError> {
        let mut events = HashMap::new();
        let mut json_fragments = Vec::new();

        for (idx, entry) in entries.iter().enumerate() {
            match entry {
                Value::Object(obj) => {
                    if obj.get("type").and_then(Value::as_str) == Some("event") {
                        json_fragments.push(entry.clone());
                    }
                }
                Value::String(s) => {
                    let s = s.trim();
                    if !s.starts_with("event ") {
                        tracing::debug!("Ignoring non-event ABI entry: {}", s);
                        continue;
                    }
                    let parsed = ParsedEvent::from_signature(s).map_err(|source| AbiError::Event {
                        entry: s.to_string(),
                        source,
                    })?;
                    events.insert(parsed.topic0, parsed);
                }
                _ => return Err(AbiError::UnsupportedEntry(idx)),
            }
        }

        let abi: JsonAbi = serde_json::from_value(Value::Array(json_fragments))?;
        for event in abi.events() {
            let parsed = ParsedEvent::from_json_event(event).map_err(|source| AbiError::Event {
                entry: event.name.clone(),
                source,
            })?;
            events.insert(parsed.topic0, parsed);
        }

        Ok(Self { events })
    }

    pub fn event_by_topic(&self, topic0: &B256) -> Option<&ParsedEvent> {
        self.events.get(topic0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.values().map(|e| e.name.as_str())
    }
}
