use serde_json::Value as JsonValue;

/// A value bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    /// Stored as BIGINT
    Int64(i64),
    Text(String),
    /// Unix seconds, stored as TIMESTAMPTZ
    Timestamp(i64),
    /// Stored as JSONB
    Json(JsonValue),
}

/// A write executed inside [`super::DbPool::execute_transaction`].
#[derive(Debug, Clone)]
pub enum DbOperation {
    /// INSERT with ON CONFLICT DO UPDATE (or DO NOTHING when `update_columns`
    /// is empty)
    Upsert {
        table: String,
        columns: Vec<String>,
        values: Vec<DbValue>,
        conflict_columns: Vec<String>,
        update_columns: Vec<String>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<DbValue>,
    },
}
