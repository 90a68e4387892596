use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::SinkError;
use crate::db::{DbError, DbOperation, DbPool, DbValue};
use crate::decoding::prefixed_hex;
use crate::ingestion::EventSink;
use crate::transformations::NormalizedRecord;

const EVENTS_TABLE: &str = "ingested_events";

/// Appends each record to `ingested_events` with its properties as JSONB.
pub struct PgEventSink {
    pool: Arc<DbPool>,
}

impl PgEventSink {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSink for PgEventSink {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn emit(&self, event_name: &str, record: &NormalizedRecord) -> Result<(), SinkError> {
        let op = insert_operation(event_name, record)?;
        self.pool.execute_transaction(vec![op]).await?;
        Ok(())
    }
}

fn insert_operation(event_name: &str, record: &NormalizedRecord) -> Result<DbOperation, DbError> {
    let block_number = i64::try_from(record.block_number)
        .map_err(|_| DbError::BlockNumberOverflow(record.block_number))?;
    let timestamp = i64::try_from(record.timestamp).unwrap_or(i64::MAX);

    let distinct_id = match &record.distinct_id {
        None | Some(Value::Null) => DbValue::Null,
        Some(Value::String(s)) => DbValue::Text(s.clone()),
        Some(other) => DbValue::Text(other.to_string()),
    };

    Ok(DbOperation::Insert {
        table: EVENTS_TABLE.to_string(),
        columns: vec![
            "event_name".to_string(),
            "distinct_id".to_string(),
            "block_number".to_string(),
            "block_hash".to_string(),
            "block_timestamp".to_string(),
            "properties".to_string(),
        ],
        values: vec![
            DbValue::Text(event_name.to_string()),
            distinct_id,
            DbValue::Int64(block_number),
            DbValue::Text(prefixed_hex(record.block_hash.as_slice())),
            DbValue::Timestamp(timestamp),
            DbValue::Json(Value::Object(record.properties())),
        ],
    })
}
