//! One ingestion pass: head, checkpoint, window, logs, per-log pipeline,
//! checkpoint write.

use thiserror::Error;

use super::cache::BlockTimestampCache;
use super::context::IngestionContext;
use super::range::{compute_window, BlockWindow, MAX_LOOKBACK};
use crate::db::DbError;
use crate::decoding::{decode_log, DecodeError};
use crate::rpc::RpcError;
use crate::sink::SinkError;
use crate::transformations::{transform_event, TransformationError};
use crate::types::log::RawLog;

/// Failures that abort the cycle before the checkpoint is written.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to query latest block: {0}")]
    Head(#[source] RpcError),

    #[error("Failed to read checkpoint '{key}': {source}")]
    Checkpoint {
        key: String,
        #[source]
        source: DbError,
    },

    #[error("Failed to fetch logs for blocks {from_block}-{to_block}: {source}")]
    Logs {
        from_block: u64,
        to_block: u64,
        #[source]
        source: RpcError,
    },

    #[error("Failed to write checkpoint '{key}' = {block_number}: {source}")]
    CheckpointWrite {
        key: String,
        block_number: u64,
        #[source]
        source: DbError,
    },
}

/// Failure confined to a single log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log has no block number or block hash (pending?)")]
    MissingBlock,

    #[error("Failed to fetch block timestamp: {0}")]
    Timestamp(#[from] RpcError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transform(#[from] TransformationError),

    #[error("Sink rejected record: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug)]
pub enum LogOutcome {
    Emitted { event_name: String, block_number: u64 },
    /// Topic matched no known, non-anonymous event.
    Skipped,
    Failed(LogError),
}

#[derive(Debug)]
pub struct CycleReport {
    pub latest_block: u64,
    pub window: BlockWindow,
    /// One entry per fetched log, in fetch order.
    pub outcomes: Vec<LogOutcome>,
    /// Block number written to the checkpoint store, if it moved.
    pub checkpoint_written: Option<u64>,
    pub timestamp_fetches: usize,
}

impl CycleReport {
    pub fn emitted(&self) -> usize {
        self.count(|o| matches!(o, LogOutcome::Emitted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, LogOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LogOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&LogOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

pub async fn run_cycle(ctx: &IngestionContext) -> Result<CycleReport, CycleError> {
    let latest = ctx
        .provider
        .latest_block_number()
        .await
        .map_err(CycleError::Head)?;

    let stored = ctx
        .checkpoints
        .load(&ctx.checkpoint_key)
        .await
        .map_err(|source| CycleError::Checkpoint {
            key: ctx.checkpoint_key.clone(),
            source,
        })?;
    let last_ingested = stored.unwrap_or(latest);
    if stored.is_none() {
        tracing::info!(
            "No checkpoint under '{}', starting at head block {}",
            ctx.checkpoint_key,
            latest
        );
    }

    let window = compute_window(last_ingested, latest, MAX_LOOKBACK);
    if window.is_clamped() {
        tracing::warn!(
            "Checkpoint {} is more than {} blocks behind head {}; blocks {}-{} will not be ingested",
            last_ingested,
            MAX_LOOKBACK,
            latest,
            last_ingested,
            window.from_block - 1
        );
    }
    if last_ingested > latest {
        tracing::warn!(
            "Checkpoint {} is ahead of head block {}; provider may be lagging",
            last_ingested,
            latest
        );
    }

    if stored.is_some_and(|last| last >= latest) {
        tracing::debug!(
            "Head {} has not moved past checkpoint {}, nothing to ingest",
            latest,
            last_ingested
        );
        return Ok(CycleReport {
            latest_block: latest,
            window,
            outcomes: Vec::new(),
            checkpoint_written: None,
            timestamp_fetches: 0,
        });
    }

    let logs = ctx
        .provider
        .logs(ctx.contract_address, window.from_block, window.to_block)
        .await
        .map_err(|source| CycleError::Logs {
            from_block: window.from_block,
            to_block: window.to_block,
            source,
        })?;

    tracing::debug!(
        "Fetched {} logs for {} in blocks {}-{} ({} blocks)",
        logs.len(),
        ctx.contract_address,
        window.from_block,
        window.to_block,
        window.len()
    );

    let mut cache = BlockTimestampCache::new();
    let mut outcomes = Vec::with_capacity(logs.len());

    for log in &logs {
        let outcome = match process_log(ctx, &mut cache, log).await {
            Ok(Some((event_name, block_number))) => LogOutcome::Emitted {
                event_name,
                block_number,
            },
            Ok(None) => LogOutcome::Skipped,
            Err(e) => LogOutcome::Failed(e),
        };
        log_outcome(log, &outcome);
        outcomes.push(outcome);
    }

    ctx.checkpoints
        .store(&ctx.checkpoint_key, latest)
        .await
        .map_err(|source| CycleError::CheckpointWrite {
            key: ctx.checkpoint_key.clone(),
            block_number: latest,
            source,
        })?;

    let report = CycleReport {
        latest_block: latest,
        window,
        outcomes,
        checkpoint_written: Some(latest),
        timestamp_fetches: cache.fetches(),
    };

    tracing::info!(
        "Cycle done for blocks {}-{}: {} logs, {} emitted, {} skipped, {} failed",
        report.window.from_block,
        report.window.to_block,
        report.outcomes.len(),
        report.emitted(),
        report.skipped(),
        report.failed()
    );

    Ok(report)
}

fn log_outcome(log: &RawLog, outcome: &LogOutcome) {
    match outcome {
        LogOutcome::Emitted {
            event_name,
            block_number,
        } => tracing::debug!("Emitted {} from block {}", event_name, block_number),
        LogOutcome::Skipped => tracing::debug!(
            "Skipping log with unknown topic {:?} in block {:?}",
            log.topic0(),
            log.block_number
        ),
        LogOutcome::Failed(e) => tracing::warn!(
            "Failed to process log in block {:?} with topic {:?}: {}",
            log.block_number,
            log.topic0(),
            e
        ),
    }
}

/// Timestamp, decode, transform, emit. `Ok(None)` means the log is not one
/// of ours.
async fn process_log(
    ctx: &IngestionContext,
    cache: &mut BlockTimestampCache,
    log: &RawLog,
) -> Result<Option<(String, u64)>, LogError> {
    let (Some(block_number), Some(block_hash)) = (log.block_number, log.block_hash) else {
        return Err(LogError::MissingBlock);
    };

    // Timestamp before decode: a failed lookup fails the log even when its
    // topic is unknown. Reordering changes which outcome such logs get.
    let timestamp = cache.get_or_fetch(block_hash, ctx.provider.as_ref()).await?;

    let Some(event) = decode_log(log, &ctx.schema)? else {
        return Ok(None);
    };

    let record = transform_event(&event, &ctx.instructions, timestamp, block_number, block_hash)?;
    ctx.sink.emit(&record.event_name, &record).await?;

    Ok(Some((record.event_name, block_number)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Mutex;

    use super::*;
    use crate::decoding::InterfaceSchema;
    use crate::ingestion::memory::MemoryCheckpointStore;
    use crate::ingestion::traits::{ChainProvider, CheckpointStore, EventSink};
    use crate::transformations::{NormalizedRecord, ParsingInstructions};

    const KEY: &str = "last_ingested_block_number";

    #[derive(Default)]
    struct ScriptedProvider {
        head: u64,
        logs: Vec<RawLog>,
        timestamps: HashMap<B256, u64>,
        fail_head: bool,
        fail_logs: bool,
        timestamp_calls: AtomicUsize,
        log_calls: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl ChainProvider for ScriptedProvider {
        async fn latest_block_number(&self) -> Result<u64, RpcError> {
            if self.fail_head {
                return Err(RpcError::ProviderError("connection refused".to_string()));
            }
            Ok(self.head)
        }

        async fn logs(
            &self,
            _address: Address,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<RawLog>, RpcError> {
            self.log_calls.lock().await.push((from_block, to_block));
            if self.fail_logs {
                return Err(RpcError::ProviderError("query timeout".to_string()));
            }
            Ok(self
                .logs
                .iter()
                .filter(|l| {
                    l.block_number
                        .is_some_and(|n| n >= from_block && n <= to_block)
                })
                .cloned()
                .collect())
        }

        async fn block_timestamp(&self, block_hash: B256) -> Result<u64, RpcError> {
            self.timestamp_calls.fetch_add(1, Ordering::SeqCst);
            self.timestamps
                .get(&block_hash)
                .copied()
                .ok_or(RpcError::BlockNotFound(block_hash))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(String, NormalizedRecord)>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn emit(&self, event_name: &str, record: &NormalizedRecord) -> Result<(), SinkError> {
            self.records
                .lock()
                .await
                .push((event_name.to_string(), record.clone()));
            Ok(())
        }
    }

    fn block_hash(n: u64) -> B256 {
        B256::left_padding_from(&n.to_be_bytes())
    }

    fn transfer_log(block: u64, to: Address, amount: u128) -> RawLog {
        RawLog {
            address: Address::repeat_byte(0x01),
            topics: vec![keccak256("Transfer(address,uint256)"), to.into_word()],
            data: Bytes::from(U256::from(amount).to_be_bytes::<32>().to_vec()),
            block_number: Some(block),
            block_hash: Some(block_hash(block)),
        }
    }

    fn unknown_log(block: u64) -> RawLog {
        RawLog {
            address: Address::repeat_byte(0x01),
            topics: vec![B256::repeat_byte(0x99)],
            data: Bytes::new(),
            block_number: Some(block),
            block_hash: Some(block_hash(block)),
        }
    }

    fn provider(head: u64, logs: Vec<RawLog>) -> ScriptedProvider {
        let timestamps = logs
            .iter()
            .filter_map(|l| l.block_number.map(|n| (block_hash(n), 1_700_000_000 + n * 12)))
            .collect();
        ScriptedProvider {
            head,
            logs,
            timestamps,
            ..Default::default()
        }
    }

    struct Harness {
        ctx: IngestionContext,
        provider: Arc<ScriptedProvider>,
        checkpoints: Arc<MemoryCheckpointStore>,
        sink: Arc<RecordingSink>,
    }

    fn harness(provider: ScriptedProvider, checkpoint: Option<u64>) -> Harness {
        let schema = InterfaceSchema::from_json_values(&[Value::String(
            "event Transfer(address indexed to, uint256 amount)".to_string(),
        )])
        .unwrap();
        let raw = serde_json::from_str(
            r#"{ "Transfer": { "to": { "isDistinctId": true }, "amount": { "argType": "eth" } } }"#,
        )
        .unwrap();

        let provider = Arc::new(provider);
        let checkpoints = Arc::new(match checkpoint {
            Some(n) => MemoryCheckpointStore::with_checkpoint(KEY, n),
            None => MemoryCheckpointStore::new(),
        });
        let sink = Arc::new(RecordingSink::default());

        let ctx = IngestionContext {
            contract_address: Address::repeat_byte(0x01),
            schema,
            instructions: ParsingInstructions::from_raw(Some(raw)),
            checkpoint_key: KEY.to_string(),
            provider: provider.clone(),
            checkpoints: checkpoints.clone(),
            sink: sink.clone(),
        };

        Harness {
            ctx,
            provider,
            checkpoints,
            sink,
        }
    }

    #[tokio::test]
    async fn test_transfer_emitted_and_checkpoint_advanced() {
        let to = Address::repeat_byte(0xab);
        let h = harness(
            provider(110, vec![transfer_log(105, to, 2_000_000_000_000_000_000)]),
            Some(100),
        );

        let report = run_cycle(&h.ctx).await.unwrap();
        assert_eq!((report.window.from_block, report.window.to_block), (100, 110));
        assert_eq!(report.emitted(), 1);
        assert!(matches!(
            &report.outcomes[0],
            LogOutcome::Emitted { event_name, block_number: 105 } if event_name == "Transfer"
        ));
        assert_eq!(report.checkpoint_written, Some(110));
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(110));

        let records = h.sink.records.lock().await;
        let (event_name, record) = &records[0];
        assert_eq!(event_name, "Transfer");
        assert_eq!(record.fields["amount"], Value::String("2".to_string()));
        assert_eq!(record.distinct_id, Some(Value::String(to.to_checksum(None))));
        assert_eq!(record.block_number, 105);
        assert_eq!(record.timestamp, 1_700_000_000 + 105 * 12);
    }

    #[tokio::test]
    async fn test_first_run_starts_at_head() {
        let h = harness(provider(500, vec![transfer_log(10, Address::ZERO, 1)]), None);

        let report = run_cycle(&h.ctx).await.unwrap();
        assert_eq!((report.window.from_block, report.window.to_block), (500, 500));
        assert_eq!(report.emitted(), 0);
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(500));
    }

    #[tokio::test]
    async fn test_clamped_window() {
        let h = harness(provider(10_000, Vec::new()), Some(1_000));

        let report = run_cycle(&h.ctx).await.unwrap();
        assert!(report.window.is_clamped());
        assert_eq!(h.provider.log_calls.lock().await.as_slice(), &[(9_000, 10_000)]);
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(10_000));
    }

    #[tokio::test]
    async fn test_unknown_topic_is_skipped_silently() {
        let h = harness(provider(110, vec![unknown_log(105)]), Some(100));

        let report = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 0);
        assert!(h.sink.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_one_timestamp_fetch_per_block() {
        let logs = vec![
            transfer_log(105, Address::repeat_byte(1), 1),
            transfer_log(105, Address::repeat_byte(2), 2),
            transfer_log(105, Address::repeat_byte(3), 3),
            transfer_log(107, Address::repeat_byte(4), 4),
        ];
        let h = harness(provider(110, logs), Some(100));

        let report = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(report.emitted(), 4);
        assert_eq!(h.provider.timestamp_calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.timestamp_fetches, 2);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let h = harness(
            provider(110, vec![transfer_log(105, Address::ZERO, 1)]),
            Some(100),
        );

        let first = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(first.emitted(), 1);

        let second = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(second.emitted(), 0);
        assert_eq!(second.checkpoint_written, None);
        assert_eq!(h.sink.records.lock().await.len(), 1);
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(110));
    }

    #[tokio::test]
    async fn test_unchanged_head_does_not_reemit_head_block() {
        let h = harness(
            provider(110, vec![transfer_log(110, Address::repeat_byte(0xab), 1)]),
            Some(100),
        );

        let first = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(first.emitted(), 1);

        let second = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(second.emitted(), 0);
        assert!(second.outcomes.is_empty());
        assert_eq!(second.checkpoint_written, None);
        assert_eq!(h.sink.records.lock().await.len(), 1);
        assert_eq!(h.provider.log_calls.lock().await.as_slice(), &[(100, 110)]);
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(110));
    }

    #[tokio::test]
    async fn test_failed_outcome_keeps_reason() {
        let mut p = provider(110, vec![transfer_log(105, Address::ZERO, 1)]);
        p.timestamps.clear();
        let h = harness(p, Some(100));

        let report = run_cycle(&h.ctx).await.unwrap();
        match &report.outcomes[0] {
            LogOutcome::Failed(LogError::Timestamp(RpcError::BlockNotFound(hash))) => {
                assert_eq!(*hash, block_hash(105));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_topic_still_needs_timestamp() {
        let mut p = provider(110, vec![unknown_log(105)]);
        p.timestamps.clear();
        let h = harness(p, Some(100));

        let report = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(report.skipped(), 0);
        assert!(matches!(
            report.outcomes[0],
            LogOutcome::Failed(LogError::Timestamp(_))
        ));
        assert_eq!(h.provider.timestamp_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_isolated_failure_does_not_stop_cycle() {
        let mut broken = transfer_log(104, Address::ZERO, 1);
        broken.data = Bytes::from(vec![0u8; 3]);
        let logs = vec![
            transfer_log(103, Address::repeat_byte(1), 1),
            broken,
            transfer_log(106, Address::repeat_byte(2), 2),
        ];
        let h = harness(provider(110, logs), Some(100));

        let report = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(report.emitted(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcomes[1],
            LogOutcome::Failed(LogError::Decode(_))
        ));
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(110));
    }

    #[tokio::test]
    async fn test_pending_log_is_a_log_failure() {
        let mut pending = transfer_log(105, Address::ZERO, 1);
        pending.block_hash = None;
        let h = harness(provider(110, vec![pending]), Some(100));

        let report = run_cycle(&h.ctx).await.unwrap();
        assert!(matches!(report.outcomes[0], LogOutcome::Failed(LogError::MissingBlock)));
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(110));
    }

    #[tokio::test]
    async fn test_head_failure_leaves_checkpoint() {
        let mut p = provider(110, Vec::new());
        p.fail_head = true;
        let h = harness(p, Some(100));

        assert!(matches!(run_cycle(&h.ctx).await, Err(CycleError::Head(_))));
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_log_fetch_failure_leaves_checkpoint() {
        let mut p = provider(110, vec![transfer_log(105, Address::ZERO, 1)]);
        p.fail_logs = true;
        let h = harness(p, Some(100));

        assert!(matches!(
            run_cycle(&h.ctx).await,
            Err(CycleError::Logs { from_block: 100, to_block: 110, .. })
        ));
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(100));
        assert!(h.sink.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_checkpoint_never_moves_backwards() {
        let h = harness(provider(90, Vec::new()), Some(100));

        let report = run_cycle(&h.ctx).await.unwrap();
        assert_eq!(report.checkpoint_written, None);
        assert!(h.provider.log_calls.lock().await.is_empty());
        assert_eq!(h.checkpoints.load(KEY).await.unwrap(), Some(100));
    }
}
