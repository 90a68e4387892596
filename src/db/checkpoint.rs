use std::sync::Arc;

use async_trait::async_trait;

use super::error::DbError;
use super::pool::DbPool;
use super::types::{DbOperation, DbValue};
use crate::ingestion::CheckpointStore;

const CHECKPOINT_TABLE: &str = "_ingestion_checkpoints";

/// Checkpoints persisted in `_ingestion_checkpoints`, one row per key.
pub struct PgCheckpointStore {
    pool: Arc<DbPool>,
}

impl PgCheckpointStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<u64>, DbError> {
        let rows = self
            .pool
            .query(
                &format!("SELECT block_number FROM {} WHERE key = $1", CHECKPOINT_TABLE),
                &[&key],
            )
            .await?;

        match rows.first() {
            Some(row) => {
                let value: i64 = row.get(0);
                u64::try_from(value)
                    .map(Some)
                    .map_err(|_| DbError::NegativeCheckpoint {
                        key: key.to_string(),
                        value,
                    })
            }
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, block_number: u64) -> Result<(), DbError> {
        self.pool
            .execute_transaction(vec![checkpoint_upsert(key, block_number)?])
            .await
    }
}

fn checkpoint_upsert(key: &str, block_number: u64) -> Result<DbOperation, DbError> {
    let value = i64::try_from(block_number).map_err(|_| DbError::BlockNumberOverflow(block_number))?;

    Ok(DbOperation::Upsert {
        table: CHECKPOINT_TABLE.to_string(),
        columns: vec![
            "key".to_string(),
            "block_number".to_string(),
            "updated_at".to_string(),
        ],
        values: vec![
            DbValue::Text(key.to_string()),
            DbValue::Int64(value),
            DbValue::Timestamp(chrono::Utc::now().timestamp()),
        ],
        conflict_columns: vec!["key".to_string()],
        update_columns: vec!["block_number".to_string(), "updated_at".to_string()],
    })
}
