mod db;
mod decoding;
mod ingestion;
mod rpc;
mod sink;
mod transformations;
mod types;

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use db::{DbPool, PgCheckpointStore};
use decoding::InterfaceSchema;
use ingestion::{run_cycle, CheckpointStore, EventSink, IngestionContext, MemoryCheckpointStore};
use rpc::{RateLimitConfig, RpcClient, RpcClientConfig};
use sink::{CaptureConfig, CaptureSink, LogSink, PgEventSink};
use transformations::ParsingInstructions;
use types::config::ingester::IngesterConfig;
use types::config::sink::SinkConfig;

const DEFAULT_CONFIG_PATH: &str = "config/config.json";
const MIGRATIONS_DIR: &str = "migrations";

#[derive(Debug, Parser)]
#[clap(rename_all = "kebab-case", author, version)]
struct Args {
    /// Path to the ingester config file.
    #[clap(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Run a single cycle and exit.
    #[clap(long)]
    once: bool,
    /// Log records instead of delivering them and keep progress in memory.
    #[clap(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = IngesterConfig::load(&args.config)?;
    let required = if args.dry_run {
        vec![config.rpc_url_env_var.as_str()]
    } else {
        config.required_env_vars()
    };
    load_required_env_vars(&required)?;

    if args.dry_run {
        tracing::info!("Running in dry-run mode (records are logged, progress is not persisted)");
    }

    let ctx = build_context(&config, args.dry_run).await?;
    tracing::info!(
        "Ingesting {} event(s) from {} into {} sink",
        ctx.schema.len(),
        ctx.contract_address,
        ctx.sink.name()
    );

    if args.once {
        let report = run_cycle(&ctx).await?;
        match report.checkpoint_written {
            Some(block) => tracing::info!(
                "Single cycle finished: {} emitted, {} failed, checkpoint now {} ({} timestamp lookups)",
                report.emitted(),
                report.failed(),
                block,
                report.timestamp_fetches
            ),
            None => tracing::info!(
                "Single cycle finished: {} emitted, {} failed, checkpoint unchanged at head {}",
                report.emitted(),
                report.failed(),
                report.latest_block
            ),
        }
        return Ok(());
    }

    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_cycle(&ctx).await {
                    tracing::error!("Ingestion cycle aborted, will retry next tick: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, stopping");
                return Ok(());
            }
        }
    }
}

/// Ensures all required env vars are set, loading .env if needed.
fn load_required_env_vars(required: &[&str]) -> anyhow::Result<()> {
    let missing: Vec<&&str> = required
        .iter()
        .filter(|var| env::var(var).is_err())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    dotenvy::dotenv().with_context(|| {
        format!(
            "Missing env vars {:?} and failed to load .env file",
            missing
        )
    })?;

    let still_missing: Vec<&str> = required
        .iter()
        .filter(|var| env::var(var).is_err())
        .copied()
        .collect();

    anyhow::ensure!(
        still_missing.is_empty(),
        "Missing required env vars after loading .env: {:?}",
        still_missing
    );

    Ok(())
}

/// One pool per database URL env var, migrated on first use.
#[derive(Default)]
struct Pools {
    by_env_var: HashMap<String, Arc<DbPool>>,
}

impl Pools {
    async fn get(&mut self, env_var: &str) -> anyhow::Result<Arc<DbPool>> {
        if let Some(pool) = self.by_env_var.get(env_var) {
            return Ok(pool.clone());
        }

        let url = env::var(env_var).with_context(|| format!("env var {} not set", env_var))?;
        let pool = Arc::new(
            DbPool::new(&url)
                .await
                .with_context(|| format!("Failed to connect to database from {}", env_var))?,
        );
        pool.run_migrations(Path::new(MIGRATIONS_DIR))
            .await
            .context("Failed to run migrations")?;

        self.by_env_var.insert(env_var.to_string(), pool.clone());
        Ok(pool)
    }
}

async fn build_context(config: &IngesterConfig, dry_run: bool) -> anyhow::Result<IngestionContext> {
    let schema = InterfaceSchema::from_json_values(&config.contract_abi)
        .context("Invalid contract_abi")?;
    if schema.is_empty() {
        tracing::warn!("contract_abi defines no events; every log will be skipped");
    }
    let instructions = ParsingInstructions::from_raw(config.event_parsing_instructions.clone());
    if instructions.is_empty() {
        tracing::info!("No event parsing instructions; arguments pass through unchanged");
    }
    if let Some(events) = &config.event_parsing_instructions {
        let known: Vec<&str> = schema.event_names().collect();
        for event_name in events.keys() {
            if !known.contains(&event_name.as_str()) {
                tracing::warn!(
                    "Parsing instructions reference event {} which is not in the ABI",
                    event_name
                );
            }
        }
    }

    let rpc_url = env::var(&config.rpc_url_env_var)
        .with_context(|| format!("env var {} not set", config.rpc_url_env_var))?;
    let url = url::Url::parse(&rpc_url)
        .with_context(|| format!("Invalid RPC URL in {}", config.rpc_url_env_var))?;
    let mut rpc_config = RpcClientConfig::new(url);
    if let Some(rps) = config.requests_per_second {
        rpc_config = rpc_config.with_rate_limit(RateLimitConfig::per_second(rps));
    }
    let provider = Arc::new(RpcClient::new(rpc_config));

    let mut pools = Pools::default();

    let checkpoints: Arc<dyn CheckpointStore> = match (&config.checkpoint.database_url_env_var, dry_run) {
        (Some(env_var), false) => Arc::new(PgCheckpointStore::new(pools.get(env_var).await?)),
        _ => {
            if !dry_run {
                tracing::warn!("No checkpoint database configured; progress will not survive restarts");
            }
            Arc::new(MemoryCheckpointStore::new())
        }
    };

    let sink: Arc<dyn EventSink> = match (&config.sink, dry_run) {
        (_, true) | (SinkConfig::Log, _) => Arc::new(LogSink),
        (SinkConfig::Capture { host, api_key_env_var }, false) => {
            let api_key = env::var(api_key_env_var)
                .with_context(|| format!("env var {} not set", api_key_env_var))?;
            Arc::new(
                CaptureSink::new(CaptureConfig {
                    host: host.clone(),
                    api_key,
                    fallback_distinct_id: config.contract_address,
                })
                .context("Failed to build capture sink")?,
            )
        }
        (SinkConfig::Postgres { database_url_env_var }, false) => {
            Arc::new(PgEventSink::new(pools.get(database_url_env_var).await?))
        }
    };

    Ok(IngestionContext {
        contract_address: config.contract_address,
        schema,
        instructions,
        checkpoint_key: config.checkpoint.key.clone(),
        provider,
        checkpoints,
        sink,
    })
}
