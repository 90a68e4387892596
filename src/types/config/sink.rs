use serde::Deserialize;

/// Where normalized records are delivered.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// HTTP capture endpoint of an analytics service.
    Capture {
        host: String,
        api_key_env_var: String,
    },
    /// Append records to the `ingested_events` table.
    Postgres { database_url_env_var: String },
    /// Only log records (dry runs).
    Log,
}

impl SinkConfig {
    pub fn required_env_vars(&self) -> Vec<&str> {
        match self {
            SinkConfig::Capture {
                api_key_env_var, ..
            } => vec![api_key_env_var.as_str()],
            SinkConfig::Postgres {
                database_url_env_var,
            } => vec![database_url_env_var.as_str()],
            SinkConfig::Log => Vec::new(),
        }
    }
}
