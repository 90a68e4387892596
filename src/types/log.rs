use alloy::primitives::{Address, Bytes, B256};
use alloy::rpc::types::Log;

/// A log as returned by the node, reduced to what ingestion needs.
///
/// Block metadata is optional because nodes omit it for pending logs; the
/// ingestion cycle treats such logs as per-log failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
}

impl RawLog {
    /// First topic, which carries the event selector for non-anonymous events.
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

impl From<Log> for RawLog {
    fn from(log: Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            block_hash: log.block_hash,
        }
    }
}
