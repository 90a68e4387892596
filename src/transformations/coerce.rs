use alloy::primitives::U256;
use serde_json::{Number, Value};

use crate::decoding::{hex_integer, prefixed_hex, DecodedValue};
use crate::types::config::instructions::ArgType;

const ETHER_DECIMALS: u8 = 18;

/// Coerce a decoded value into the representation named by `arg_type`.
///
/// Errors carry a short reason; the caller attaches event and argument names.
pub fn coerce(value: &DecodedValue, arg_type: ArgType) -> Result<Value, String> {
    match arg_type {
        ArgType::Eth => {
            let (negative, magnitude) = integer(value)?;
            Ok(Value::String(format_units(negative, magnitude, ETHER_DECIMALS)))
        }
        ArgType::Number => {
            let (negative, magnitude) = integer(value)?;
            to_json_number(negative, magnitude)
        }
        ArgType::Int => {
            let (negative, magnitude) = integer(value)?;
            let sign = if negative { "-" } else { "" };
            Ok(Value::String(format!("{}{}", sign, magnitude)))
        }
        ArgType::String => to_text(value).map(Value::String),
        ArgType::Hex => to_hex(value).map(Value::String),
        ArgType::Boolean => to_bool(value).map(Value::Bool),
    }
}

fn integer(value: &DecodedValue) -> Result<(bool, U256), String> {
    value
        .as_signed_magnitude()
        .ok_or_else(|| format!("{} is not an integer", value.to_json()))
}

/// Render `magnitude / 10^decimals` as a decimal string without trailing
/// zeros, e.g. `1500000000000000000` with 18 decimals is `"1.5"`.
fn format_units(negative: bool, magnitude: U256, decimals: u8) -> String {
    let base = U256::from(10u64).pow(U256::from(decimals));
    let whole = magnitude / base;
    let fraction = magnitude % base;
    let sign = if negative && !magnitude.is_zero() { "-" } else { "" };

    if fraction.is_zero() {
        return format!("{}{}", sign, whole);
    }

    let digits = fraction.to_string();
    let padded = format!("{}{}", "0".repeat(decimals as usize - digits.len()), digits);
    format!("{}{}.{}", sign, whole, padded.trim_end_matches('0'))
}

/// Exact for anything that fits in u64/i64; wider values go through f64 and
/// lose precision above 2^53.
fn to_json_number(negative: bool, magnitude: U256) -> Result<Value, String> {
    if let Ok(n) = u64::try_from(magnitude) {
        if !negative {
            return Ok(Value::from(n));
        }
        if let Ok(signed) = i64::try_from(n) {
            return Ok(Value::from(-signed));
        }
    }

    let float: f64 = magnitude
        .to_string()
        .parse()
        .map_err(|e| format!("cannot represent {} as a number: {}", magnitude, e))?;
    let float = if negative { -float } else { float };
    Number::from_f64(float)
        .map(Value::Number)
        .ok_or_else(|| format!("{} is not a finite number", magnitude))
}

/// NUL-padded bytes (typically bytes32) to text, cut at the first NUL.
fn to_text(value: &DecodedValue) -> Result<String, String> {
    match value {
        DecodedValue::String(s) => Ok(s.clone()),
        DecodedValue::FixedBytes(..) | DecodedValue::Bytes(_) => {
            let bytes = value.as_bytes().unwrap_or_default();
            let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            String::from_utf8(bytes[..end].to_vec())
                .map_err(|e| format!("bytes are not valid UTF-8 text: {}", e))
        }
        other => Err(format!("{} is not a byte string", other.to_json())),
    }
}

fn to_hex(value: &DecodedValue) -> Result<String, String> {
    match value {
        DecodedValue::Uint(..) | DecodedValue::Int(..) => {
            let (negative, magnitude) = integer(value)?;
            Ok(hex_integer(negative, magnitude))
        }
        DecodedValue::Address(_) | DecodedValue::FixedBytes(..) | DecodedValue::Bytes(_) => {
            Ok(prefixed_hex(value.as_bytes().unwrap_or_default()))
        }
        DecodedValue::String(s) if s.starts_with("0x") && hex::decode(&s[2..]).is_ok() => {
            Ok(s.to_lowercase())
        }
        other => Err(format!("{} has no hex representation", other.to_json())),
    }
}

fn to_bool(value: &DecodedValue) -> Result<bool, String> {
    match value {
        DecodedValue::Bool(b) => Ok(*b),
        DecodedValue::Uint(..) | DecodedValue::Int(..) => {
            let (_, magnitude) = integer(value)?;
            Ok(!magnitude.is_zero())
        }
        DecodedValue::Address(_) | DecodedValue::FixedBytes(..) | DecodedValue::Bytes(_) => {
            Ok(value.as_bytes().unwrap_or_default().iter().any(|b| *b != 0))
        }
        DecodedValue::String(s) => Ok(!s.is_empty()),
        other => Err(format!("{} has no boolean interpretation", other.to_json())),
    }
}
