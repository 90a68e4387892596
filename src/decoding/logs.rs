use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, B256, I256, U256};
use thiserror::Error;

use super::abi::InterfaceSchema;
use super::event_parsing::ParsedEvent;
use super::value::DecodedValue;
use crate::types::log::RawLog;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Event {event} expects {expected} topics, log has {actual}")]
    TopicCount {
        event: String,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to decode data for event {event}: {message}")]
    Data { event: String, message: String },

    #[error("Unsupported value in event {event}: {message}")]
    UnsupportedValue { event: String, message: String },
}

/// A log matched against the interface schema.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub name: String,
    pub signature: String,
    /// Named arguments in declaration order. Unnamed parameters are dropped.
    pub args: Vec<(String, DecodedValue)>,
}

impl DecodedEvent {
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Decode a single log.
///
/// Returns `Ok(None)` when the first topic matches no event in the schema or
/// matches an anonymous event; those logs are not ours to interpret.
pub fn decode_log(log: &RawLog, schema: &InterfaceSchema) -> Result<Option<DecodedEvent>, DecodeError> {
    let Some(topic0) = log.topic0() else {
        return Ok(None);
    };
    let Some(event) = schema.event_by_topic(topic0) else {
        return Ok(None);
    };
    if event.anonymous {
        return Ok(None);
    }

    decode_with_event(log, event).map(Some)
}

fn decode_with_event(log: &RawLog, event: &ParsedEvent) -> Result<DecodedEvent, DecodeError> {
    let indexed_params = event.indexed_params();
    let data_params = event.data_params();

    // topic[0] is the event signature
    let expected_topics = indexed_params.len() + 1;
    if log.topics.len() != expected_topics {
        return Err(DecodeError::TopicCount {
            event: event.signature.clone(),
            expected: expected_topics,
            actual: log.topics.len(),
        });
    }

    let indexed_values: Vec<DynSolValue> = indexed_params
        .iter()
        .zip(&log.topics[1..])
        .map(|(param, topic)| decode_topic(topic, &param.param_type))
        .collect();

    let data_values = if data_params.is_empty() {
        Vec::new()
    } else {
        let tuple_type = DynSolType::Tuple(data_params.iter().map(|p| p.param_type.clone()).collect());
        match tuple_type.abi_decode_params(&log.data) {
            Ok(DynSolValue::Tuple(values)) => values,
            Ok(other) => {
                return Err(DecodeError::Data {
                    event: event.signature.clone(),
                    message: format!("expected tuple, got {:?}", other),
                })
            }
            Err(e) => {
                return Err(DecodeError::Data {
                    event: event.signature.clone(),
                    message: e.to_string(),
                })
            }
        }
    };

    // Reassemble in declaration order
    let mut indexed_iter = indexed_values.into_iter();
    let mut data_iter = data_values.into_iter();
    let mut args = Vec::with_capacity(event.params.len());

    for param in &event.params {
        let value = if param.indexed {
            indexed_iter.next()
        } else {
            data_iter.next()
        };
        let value = value.ok_or_else(|| DecodeError::Data {
            event: event.signature.clone(),
            message: format!("missing value for parameter '{}'", param.name),
        })?;

        if param.name.is_empty() {
            continue;
        }

        let decoded = DecodedValue::try_from(value).map_err(|message| DecodeError::UnsupportedValue {
            event: event.signature.clone(),
            message,
        })?;
        args.push((param.name.clone(), decoded));
    }

    Ok(DecodedEvent {
        name: event.name.clone(),
        signature: event.signature.clone(),
        args,
    })
}

/// Decode a value from a topic. Dynamic and composite indexed values are only
/// available as their keccak256 hash.
fn decode_topic(topic: &B256, param_type: &DynSolType) -> DynSolValue {
    match param_type {
        DynSolType::Address => DynSolValue::Address(Address::from_slice(&topic[12..32])),
        DynSolType::Uint(bits) => DynSolValue::Uint(U256::from_be_bytes(topic.0), *bits),
        DynSolType::Int(bits) => DynSolValue::Int(I256::from_be_bytes(topic.0), *bits),
        DynSolType::Bool => DynSolValue::Bool(topic[31] != 0),
        DynSolType::FixedBytes(size) => DynSolValue::FixedBytes(*topic, *size),
        _ => DynSolValue::FixedBytes(*topic, 32),
    }
}
