use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{Address, BlockNumber, B256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{Block, BlockId, Filter, Log};
use async_trait::async_trait;
use governor::clock::{QuantaClock, QuantaInstant};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter};
use thiserror::Error;
use url::Url;

use crate::ingestion::ChainProvider;
use crate::types::log::RawLog;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Block {0} not found")]
    BlockNotFound(B256),
}

pub type StandardRateLimiter =
    RateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub url: Url,
    pub rate_limit: Option<RateLimitConfig>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: NonZeroU32,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl RateLimitConfig {
    pub fn per_second(requests_per_second: NonZeroU32) -> Self {
        Self {
            requests_per_second,
            jitter_min_ms: 5,
            jitter_max_ms: 50,
        }
    }
}

impl RpcClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }
}

/// HTTP JSON-RPC client. Every request waits on the optional rate limiter;
/// failures are returned as-is, the next cycle is the retry.
pub struct RpcClient {
    provider: RootProvider<Ethereum>,
    config: RpcClientConfig,
    rate_limiter: Option<Arc<StandardRateLimiter>>,
    jitter: Option<Jitter>,
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> Self {
        let provider = RootProvider::<Ethereum>::new_http(config.url.clone());

        let (rate_limiter, jitter) = match &config.rate_limit {
            Some(rate_config) => {
                let limiter = RateLimiter::direct(Quota::per_second(rate_config.requests_per_second));
                let jitter = Jitter::new(
                    Duration::from_millis(rate_config.jitter_min_ms),
                    Duration::from_millis(rate_config.jitter_max_ms),
                );
                (Some(Arc::new(limiter)), Some(jitter))
            }
            None => (None, None),
        };

        Self {
            provider,
            config,
            rate_limiter,
            jitter,
        }
    }

    async fn wait_for_rate_limit(&self) {
        if let (Some(limiter), Some(jitter)) = (&self.rate_limiter, &self.jitter) {
            limiter.until_ready_with_jitter(*jitter).await;
        }
    }

    pub async fn get_block_number(&self) -> Result<BlockNumber, RpcError> {
        self.wait_for_rate_limit().await;
        self.provider
            .get_block_number()
            .await
            .map_err(|e| RpcError::ProviderError(e.to_string()))
    }

    pub async fn get_block_by_hash(&self, hash: B256) -> Result<Option<Block>, RpcError> {
        self.wait_for_rate_limit().await;
        self.provider
            .get_block(BlockId::hash(hash))
            .await
            .map_err(|e| RpcError::ProviderError(e.to_string()))
    }

    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        self.wait_for_rate_limit().await;
        tracing::trace!(
            "eth_getLogs(blocks {:?}-{:?})",
            filter.get_from_block(),
            filter.get_to_block()
        );
        self.provider
            .get_logs(filter)
            .await
            .map_err(|e| RpcError::ProviderError(e.to_string()))
    }
}

#[async_trait]
impl ChainProvider for RpcClient {
    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        self.get_block_number().await
    }

    async fn logs(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RpcError> {
        let filter = Filter::new()
            .address(address)
            .from_block(from_block)
            .to_block(to_block);
        let logs = self.get_logs(&filter).await?;
        Ok(logs.into_iter().map(RawLog::from).collect())
    }

    async fn block_timestamp(&self, block_hash: B256) -> Result<u64, RpcError> {
        self.get_block_by_hash(block_hash)
            .await?
            .map(|block| block.header.timestamp)
            .ok_or(RpcError::BlockNotFound(block_hash))
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.config.url.host_str())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}
