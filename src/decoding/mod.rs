mod abi;
mod event_parsing;
mod logs;
mod value;

pub use abi::InterfaceSchema;
pub use logs::{decode_log, DecodeError, DecodedEvent};
pub use value::{hex_integer, prefixed_hex, DecodedValue};
