use std::collections::HashMap;

use crate::types::config::instructions::{ArgType, RawParsingInstructions};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArgInstruction {
    pub arg_type: Option<ArgType>,
    pub is_distinct_id: bool,
}

/// Resolved `event -> argument -> instruction` lookup, built once at startup.
///
/// A missing entry means the decoded value is passed through unchanged.
#[derive(Debug, Clone, Default)]
pub struct ParsingInstructions {
    events: HashMap<String, HashMap<String, ArgInstruction>>,
}

impl ParsingInstructions {
    pub fn from_raw(raw: Option<RawParsingInstructions>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        let events = raw
            .into_iter()
            .map(|(event_name, args)| {
                let distinct_ids: Vec<&String> = args
                    .iter()
                    .filter(|(_, cfg)| cfg.is_distinct_id)
                    .map(|(name, _)| name)
                    .collect();
                if distinct_ids.len() > 1 {
                    tracing::warn!(
                        "Event {} marks {} arguments as distinct id ({:?}); the last one in ABI order wins",
                        event_name,
                        distinct_ids.len(),
                        distinct_ids
                    );
                }

                let args = args
                    .into_iter()
                    .map(|(arg_name, cfg)| {
                        (
                            arg_name,
                            ArgInstruction {
                                arg_type: cfg.arg_type,
                                is_distinct_id: cfg.is_distinct_id,
                            },
                        )
                    })
                    .collect();
                (event_name, args)
            })
            .collect();

        Self { events }
    }

    pub fn for_event(&self, event_name: &str) -> Option<&HashMap<String, ArgInstruction>> {
        self.events.get(event_name)
    }

    #[cfg(test)]
    pub fn get(&self, event_name: &str, arg_name: &str) -> Option<&ArgInstruction> {
        self.for_event(event_name).and_then(|args| args.get(arg_name))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
