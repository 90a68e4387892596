//! Field transformation layer.
//!
//! Turns a decoded event into the normalized record handed to the sink,
//! applying per-event/per-argument parsing instructions resolved at startup.

mod coerce;
mod error;
mod instructions;
mod record;
mod transformer;

pub use error::TransformationError;
pub use instructions::ParsingInstructions;
pub use record::NormalizedRecord;
pub use transformer::transform_event;
