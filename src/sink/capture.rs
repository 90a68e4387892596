use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};

use super::SinkError;
use crate::ingestion::EventSink;
use crate::transformations::NormalizedRecord;

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Base URL; records are posted to `<host>/capture/`.
    pub host: String,
    pub api_key: String,
    /// Used as `distinct_id` for records with no argument marked as one.
    pub fallback_distinct_id: Address,
}

#[derive(Debug, Serialize)]
struct CapturePayload<'a> {
    api_key: &'a str,
    event: &'a str,
    distinct_id: Value,
    properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

/// Posts each record to an analytics capture endpoint.
pub struct CaptureSink {
    client: Client,
    endpoint: String,
    config: CaptureConfig,
}

impl CaptureSink {
    pub fn new(config: CaptureConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let endpoint = format!("{}/capture/", config.host.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    fn payload<'a>(&'a self, event_name: &'a str, record: &NormalizedRecord) -> CapturePayload<'a> {
        let distinct_id = record
            .distinct_id
            .clone()
            .unwrap_or_else(|| Value::String(self.config.fallback_distinct_id.to_checksum(None)));

        CapturePayload {
            api_key: &self.config.api_key,
            event: event_name,
            distinct_id,
            properties: record.properties(),
            timestamp: record.timestamp_rfc3339(),
        }
    }
}

#[async_trait]
impl EventSink for CaptureSink {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn emit(&self, event_name: &str, record: &NormalizedRecord) -> Result<(), SinkError> {
        let payload = self.payload(event_name, record);
        let resp = self.client.post(&self.endpoint).json(&payload).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            "Captured {} from block {} to {}",
            event_name,
            record.block_number,
            self.endpoint
        );
        Ok(())
    }
}

impl std::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSink")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::B256;

    use super::*;

    fn sink(host: &str) -> CaptureSink {
        CaptureSink::new(CaptureConfig {
            host: host.to_string(),
            api_key: "phc_test".to_string(),
            fallback_distinct_id: Address::repeat_byte(0x42),
        })
        .unwrap()
    }

    fn record(distinct_id: Option<Value>) -> NormalizedRecord {
        let mut fields = Map::new();
        fields.insert("amount".to_string(), Value::String("2".to_string()));
        NormalizedRecord {
            event_name: "Transfer".to_string(),
            timestamp: 1_700_000_000,
            block_number: 7,
            block_hash: B256::ZERO,
            fields,
            distinct_id,
        }
    }

    #[test]
    fn test_endpoint_normalized() {
        assert_eq!(sink("https://app.example.com/").endpoint, "https://app.example.com/capture/");
        assert_eq!(sink("https://app.example.com").endpoint, "https://app.example.com/capture/");
    }

    #[test]
    fn test_payload_shape() {
        let sink = sink("https://app.example.com");
        let record = record(Some(Value::String("0xabc".to_string())));
        let json = serde_json::to_value(sink.payload("Transfer", &record)).unwrap();

        assert_eq!(json["api_key"], "phc_test");
        assert_eq!(json["event"], "Transfer");
        assert_eq!(json["distinct_id"], "0xabc");
        assert_eq!(json["properties"]["amount"], "2");
        assert_eq!(json["properties"]["blockNumber"], 7);
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_payload_falls_back_to_contract_address() {
        let sink = sink("https://app.example.com");
        let json = serde_json::to_value(sink.payload("Transfer", &record(None))).unwrap();
        assert_eq!(
            json["distinct_id"],
            Value::String(Address::repeat_byte(0x42).to_checksum(None))
        );
    }
}
