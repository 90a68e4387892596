//! Transformation error types.

use thiserror::Error;

use crate::types::config::instructions::ArgType;

#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("Cannot coerce argument '{arg}' of event {event} to {arg_type:?}: {message}")]
    TypeConversion {
        event: String,
        arg: String,
        arg_type: ArgType,
        message: String,
    },
}
