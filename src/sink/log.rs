use async_trait::async_trait;
use serde_json::Value;

use super::SinkError;
use crate::ingestion::EventSink;
use crate::transformations::NormalizedRecord;

/// Writes records to the tracing output. Used for `--dry-run`.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn emit(&self, event_name: &str, record: &NormalizedRecord) -> Result<(), SinkError> {
        let properties = serde_json::to_string(&Value::Object(record.properties()))?;
        tracing::info!(
            "{} @ block {}: {}",
            event_name,
            record.block_number,
            properties
        );
        Ok(())
    }
}
