use std::collections::HashMap;

use alloy::primitives::B256;

use super::traits::ChainProvider;
use crate::rpc::RpcError;

/// Block hash to unix timestamp, scoped to a single cycle.
#[derive(Debug, Default)]
pub struct BlockTimestampCache {
    entries: HashMap<B256, u64>,
    fetches: usize,
}

impl BlockTimestampCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached timestamp, or fetch it from the provider and remember it.
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<P>(&mut self, block_hash: B256, provider: &P) -> Result<u64, RpcError>
    where
        P: ChainProvider + ?Sized,
    {
        if let Some(ts) = self.entries.get(&block_hash) {
            return Ok(*ts);
        }

        self.fetches += 1;
        let ts = provider.block_timestamp(block_hash).await?;
        self.entries.insert(block_hash, ts);
        Ok(ts)
    }

    /// Provider round trips made so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}
