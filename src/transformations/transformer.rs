use alloy::primitives::B256;
use serde_json::Map;

use super::coerce::coerce;
use super::error::TransformationError;
use super::instructions::ParsingInstructions;
use super::record::NormalizedRecord;
use crate::decoding::DecodedEvent;

/// Apply parsing instructions to a decoded event.
///
/// Arguments are visited in declaration order, so when several arguments are
/// marked as the distinct id the last one wins.
pub fn transform_event(
    event: &DecodedEvent,
    instructions: &ParsingInstructions,
    timestamp: u64,
    block_number: u64,
    block_hash: B256,
) -> Result<NormalizedRecord, TransformationError> {
    let rules = instructions.for_event(&event.name);
    let mut fields = Map::new();
    let mut distinct_id = None;

    for (arg_name, value) in &event.args {
        let rule = rules.and_then(|r| r.get(arg_name));

        let rendered = match rule.and_then(|r| r.arg_type) {
            Some(arg_type) => coerce(value, arg_type).map_err(|message| {
                TransformationError::TypeConversion {
                    event: event.name.clone(),
                    arg: arg_name.clone(),
                    arg_type,
                    message,
                }
            })?,
            None => value.to_json(),
        };

        if rule.is_some_and(|r| r.is_distinct_id) {
            distinct_id = Some(rendered.clone());
        }
        fields.insert(arg_name.clone(), rendered);
    }

    Ok(NormalizedRecord {
        event_name: event.name.clone(),
        timestamp,
        block_number,
        block_hash,
        fields,
        distinct_id,
    })
}
