//! Collaborator seams of the ingestion cycle.
//!
//! Production code plugs in the HTTP RPC client, a Postgres or in-memory
//! checkpoint store and one of the sinks; tests plug in scripted fakes.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;

use crate::db::DbError;
use crate::rpc::RpcError;
use crate::sink::SinkError;
use crate::transformations::NormalizedRecord;
use crate::types::log::RawLog;

/// Read access to the chain.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64, RpcError>;

    /// All logs emitted by `address` in `[from_block, to_block]`, in the
    /// order the node returns them.
    async fn logs(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RpcError>;

    /// Unix timestamp of the block with the given hash.
    async fn block_timestamp(&self, block_hash: B256) -> Result<u64, RpcError>;
}

/// Durable storage for the last ingested block number.
///
/// `load` returning `None` is a valid initial state.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<u64>, DbError>;

    async fn store(&self, key: &str, block_number: u64) -> Result<(), DbError>;
}

/// Destination for normalized records. Delivery failures are reported back
/// but never retried by the cycle.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn emit(&self, event_name: &str, record: &NormalizedRecord) -> Result<(), SinkError>;
}
