use std::num::NonZeroU32;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::types::config::instructions::{
    load_instructions_from_path, InstructionsOrPath, RawParsingInstructions,
};
use crate::types::config::sink::SinkConfig;

pub const DEFAULT_CHECKPOINT_KEY: &str = "last_ingested_block_number";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Contract ABI, either inline or as a path to a JSON file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AbiOrPath {
    Inline(Vec<Value>),
    Path(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_key")]
    pub key: String,
    /// When unset, progress is kept in memory only and lost on restart.
    #[serde(default)]
    pub database_url_env_var: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            key: default_checkpoint_key(),
            database_url_env_var: None,
        }
    }
}

fn default_checkpoint_key() -> String {
    DEFAULT_CHECKPOINT_KEY.to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

#[derive(Debug, Deserialize)]
pub struct IngesterConfigRaw {
    #[serde(default, alias = "contractAddress")]
    pub contract_address: Option<String>,
    #[serde(default, alias = "contractABI")]
    pub contract_abi: Option<AbiOrPath>,
    #[serde(default, alias = "eventParsingInstructions")]
    pub event_parsing_instructions: Option<InstructionsOrPath>,
    pub rpc_url_env_var: String,
    #[serde(default)]
    pub requests_per_second: Option<NonZeroU32>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    pub sink: SinkConfig,
}

#[derive(Debug)]
pub struct IngesterConfig {
    pub contract_address: Address,
    /// ABI entries, either JSON fragments or human-readable strings.
    pub contract_abi: Vec<Value>,
    pub event_parsing_instructions: Option<RawParsingInstructions>,
    pub rpc_url_env_var: String,
    pub requests_per_second: Option<NonZeroU32>,
    pub poll_interval: Duration,
    pub checkpoint: CheckpointConfig,
    pub sink: SinkConfig,
}

impl IngesterConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let raw: IngesterConfigRaw = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        resolve_ingester_config(raw, base_dir)
    }

    /// Env vars that must be present before any collaborator is built.
    pub fn required_env_vars(&self) -> Vec<&str> {
        let mut vars = vec![self.rpc_url_env_var.as_str()];
        if let Some(var) = &self.checkpoint.database_url_env_var {
            vars.push(var.as_str());
        }
        vars.extend(self.sink.required_env_vars());
        vars.sort_unstable();
        vars.dedup();
        vars
    }
}

pub fn resolve_ingester_config(
    raw: IngesterConfigRaw,
    base_dir: &Path,
) -> anyhow::Result<IngesterConfig> {
    let address_str = raw
        .contract_address
        .filter(|a| !a.trim().is_empty())
        .context("Missing required config field: contract_address")?;
    let contract_address = Address::from_str(address_str.trim())
        .with_context(|| format!("Invalid contract_address '{}'", address_str))?;

    let contract_abi = match raw
        .contract_abi
        .context("Missing required config field: contract_abi")?
    {
        AbiOrPath::Inline(entries) => entries,
        AbiOrPath::Path(p) => load_abi_from_path(base_dir, &p)?,
    };

    let event_parsing_instructions = match raw.event_parsing_instructions {
        Some(InstructionsOrPath::Inline(instructions)) => Some(instructions),
        Some(InstructionsOrPath::Path(p)) => Some(load_instructions_from_path(base_dir, &p)?),
        None => None,
    };

    anyhow::ensure!(
        raw.poll_interval_secs > 0,
        "poll_interval_secs must be greater than 0"
    );

    Ok(IngesterConfig {
        contract_address,
        contract_abi,
        event_parsing_instructions,
        rpc_url_env_var: raw.rpc_url_env_var,
        requests_per_second: raw.requests_per_second,
        poll_interval: Duration::from_secs(raw.poll_interval_secs),
        checkpoint: raw.checkpoint,
        sink: raw.sink,
    })
}

fn load_abi_from_path(base_dir: &Path, path: &str) -> anyhow::Result<Vec<Value>> {
    let full_path = base_dir.join(path);
    let content = std::fs::read_to_string(&full_path)
        .with_context(|| format!("Failed to read contract ABI at {}", full_path.display()))?;

    // Accept both a bare ABI array and a compiler artifact with an "abi" key.
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse contract ABI at {}", full_path.display()))?;
    match value {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut artifact) => match artifact.remove("abi") {
            Some(Value::Array(entries)) => Ok(entries),
            _ => anyhow::bail!(
                "Contract ABI at {} is neither an array nor an artifact with an \"abi\" array",
                full_path.display()
            ),
        },
        _ => anyhow::bail!("Contract ABI at {} is not a JSON array", full_path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_from(json: &str) -> IngesterConfigRaw {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_resolve_inline_config() {
        let raw = raw_from(
            r#"{
                "contractAddress": "0x00000000000000000000000000000000000000aa",
                "contractABI": ["event Ping(uint256 id)"],
                "eventParsingInstructions": { "Ping": { "id": { "argType": "int" } } },
                "rpc_url_env_var": "RPC_URL",
                "sink": { "type": "log" }
            }"#,
        );
        let config = resolve_ingester_config(raw, Path::new(".")).unwrap();

        assert_eq!(
            config.contract_address,
            Address::from_str("0x00000000000000000000000000000000000000aa").unwrap()
        );
        assert_eq!(config.contract_abi.len(), 1);
        assert!(config.event_parsing_instructions.is_some());
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.checkpoint.key, DEFAULT_CHECKPOINT_KEY);
        assert_eq!(config.required_env_vars(), vec!["RPC_URL"]);
    }

    #[test]
    fn test_missing_contract_address_is_fatal() {
        let raw = raw_from(
            r#"{
                "contract_abi": [],
                "rpc_url_env_var": "RPC_URL",
                "sink": { "type": "log" }
            }"#,
        );
        let err = resolve_ingester_config(raw, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("contract_address"));
    }

    #[test]
    fn test_missing_abi_is_fatal() {
        let raw = raw_from(
            r#"{
                "contract_address": "0x00000000000000000000000000000000000000aa",
                "rpc_url_env_var": "RPC_URL",
                "sink": { "type": "log" }
            }"#,
        );
        let err = resolve_ingester_config(raw, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("contract_abi"));
    }

    #[test]
    fn test_invalid_address_is_fatal() {
        let raw = raw_from(
            r#"{
                "contract_address": "not-an-address",
                "contract_abi": [],
                "rpc_url_env_var": "RPC_URL",
                "sink": { "type": "log" }
            }"#,
        );
        assert!(resolve_ingester_config(raw, Path::new(".")).is_err());
    }

    #[test]
    fn test_required_env_vars_include_sink_and_checkpoint() {
        let raw = raw_from(
            r#"{
                "contract_address": "0x00000000000000000000000000000000000000aa",
                "contract_abi": [],
                "rpc_url_env_var": "RPC_URL",
                "checkpoint": { "database_url_env_var": "DATABASE_URL" },
                "sink": { "type": "postgres", "database_url_env_var": "DATABASE_URL" }
            }"#,
        );
        let config = resolve_ingester_config(raw, Path::new(".")).unwrap();
        assert_eq!(config.required_env_vars(), vec!["DATABASE_URL", "RPC_URL"]);
    }
}
