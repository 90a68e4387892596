use std::sync::Arc;

use alloy::primitives::Address;

use super::traits::{ChainProvider, CheckpointStore, EventSink};
use crate::decoding::InterfaceSchema;
use crate::transformations::ParsingInstructions;

/// Everything a cycle needs, built once at startup and shared by reference
/// across cycles.
pub struct IngestionContext {
    pub contract_address: Address,
    pub schema: InterfaceSchema,
    pub instructions: ParsingInstructions,
    pub checkpoint_key: String,
    pub provider: Arc<dyn ChainProvider>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for IngestionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionContext")
            .field("contract_address", &self.contract_address)
            .field("events", &self.schema.len())
            .field("checkpoint_key", &self.checkpoint_key)
            .field("sink", &self.sink.name())
            .finish()
    }
}
