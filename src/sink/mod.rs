//! Destinations for normalized records.

mod capture;
mod log;
mod postgres;

use thiserror::Error;

pub use capture::{CaptureConfig, CaptureSink};
pub use log::LogSink;
pub use postgres::PgEventSink;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Capture endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
