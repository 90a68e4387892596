use std::str::FromStr;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, B256, I256, U256};
use serde_json::Value;

/// Integers no wider than this render as plain JSON numbers; they always fit
/// in an f64 mantissa. Wider integers render as hex strings.
pub const MAX_JSON_NUMBER_BITS: usize = 48;

/// A decoded event argument.
///
/// Integers are kept at full width so no precision is lost before an explicit
/// coercion is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Address(Address),
    /// Value and declared bit width.
    Uint(U256, usize),
    Int(I256, usize),
    Bool(bool),
    /// Word and declared byte size; bytes past `size` are zero.
    FixedBytes(B256, usize),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<DecodedValue>),
    Tuple(Vec<DecodedValue>),
}

impl TryFrom<DynSolValue> for DecodedValue {
    type Error = String;

    fn try_from(value: DynSolValue) -> Result<Self, Self::Error> {
        match value {
            DynSolValue::Address(addr) => Ok(DecodedValue::Address(addr)),
            DynSolValue::Uint(val, bits) => Ok(DecodedValue::Uint(val, bits)),
            DynSolValue::Int(val, bits) => Ok(DecodedValue::Int(val, bits)),
            DynSolValue::Bool(b) => Ok(DecodedValue::Bool(b)),
            DynSolValue::FixedBytes(word, size) => Ok(DecodedValue::FixedBytes(word, size)),
            DynSolValue::Bytes(bytes) => Ok(DecodedValue::Bytes(bytes)),
            DynSolValue::String(s) => Ok(DecodedValue::String(s)),
            DynSolValue::Array(values) | DynSolValue::FixedArray(values) => values
                .into_iter()
                .map(DecodedValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(DecodedValue::Array),
            DynSolValue::Tuple(values) => values
                .into_iter()
                .map(DecodedValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(DecodedValue::Tuple),
            other => Err(format!("Unsupported value type: {:?}", other)),
        }
    }
}

impl DecodedValue {
    /// Sign and magnitude of an integer value. Numeric strings are accepted
    /// too, so instructions still apply to values rendered upstream as text.
    pub fn as_signed_magnitude(&self) -> Option<(bool, U256)> {
        match self {
            DecodedValue::Uint(v, _) => Some((false, *v)),
            DecodedValue::Int(v, _) => Some((v.is_negative(), v.unsigned_abs())),
            DecodedValue::String(s) => {
                let s = s.trim();
                if let Some(magnitude) = s.strip_prefix('-') {
                    parse_unsigned(magnitude).map(|v| (!v.is_zero(), v))
                } else {
                    parse_unsigned(s).map(|v| (false, v))
                }
            }
            _ => None,
        }
    }

    /// Raw bytes of byte-like values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DecodedValue::FixedBytes(word, size) => Some(&word[..*size]),
            DecodedValue::Bytes(b) => Some(b),
            DecodedValue::Address(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    /// JSON rendering used when no instruction applies to the argument.
    pub fn to_json(&self) -> Value {
        match self {
            DecodedValue::Address(addr) => Value::String(addr.to_checksum(None)),
            DecodedValue::Uint(v, bits) => {
                if *bits <= MAX_JSON_NUMBER_BITS {
                    if let Ok(n) = u64::try_from(*v) {
                        return Value::from(n);
                    }
                }
                Value::String(hex_integer(false, *v))
            }
            DecodedValue::Int(v, bits) => {
                if *bits <= MAX_JSON_NUMBER_BITS {
                    if let Ok(n) = i64::try_from(*v) {
                        return Value::from(n);
                    }
                }
                Value::String(hex_integer(v.is_negative(), v.unsigned_abs()))
            }
            DecodedValue::Bool(b) => Value::Bool(*b),
            DecodedValue::FixedBytes(word, size) => Value::String(prefixed_hex(&word[..*size])),
            DecodedValue::Bytes(b) => Value::String(prefixed_hex(b)),
            DecodedValue::String(s) => Value::String(s.clone()),
            DecodedValue::Array(values) | DecodedValue::Tuple(values) => {
                Value::Array(values.iter().map(DecodedValue::to_json).collect())
            }
        }
    }
}

fn parse_unsigned(s: &str) -> Option<U256> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        U256::from_str_radix(hex, 16).ok()
    } else {
        U256::from_str(s).ok()
    }
}

/// `0x`-prefixed lowercase hex of an integer, with a leading `-` when negative.
pub fn hex_integer(negative: bool, magnitude: U256) -> String {
    let sign = if negative && !magnitude.is_zero() { "-" } else { "" };
    format!("{}0x{:x}", sign, magnitude)
}

pub fn prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_integers_render_as_hex() {
        let value = DecodedValue::Uint(U256::from(2_000_000_000_000_000_000u128), 256);
        assert_eq!(value.to_json(), Value::String("0x1bc16d674ec80000".to_string()));

        let negative = DecodedValue::Int(I256::try_from(-255i64).unwrap(), 256);
        assert_eq!(negative.to_json(), Value::String("-0xff".to_string()));
    }

    #[test]
    fn test_narrow_integers_render_as_numbers() {
        assert_eq!(DecodedValue::Uint(U256::from(42u64), 8).to_json(), Value::from(42u64));
        assert_eq!(
            DecodedValue::Int(I256::try_from(-7i64).unwrap(), 32).to_json(),
            Value::from(-7i64)
        );
    }

    #[test]
    fn test_address_renders_checksummed() {
        let addr = Address::from_str("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(
            DecodedValue::Address(addr).to_json(),
            Value::String("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string())
        );
    }

    #[test]
    fn test_fixed_bytes_respect_size() {
        let mut word = B256::ZERO;
        word[0] = 0xab;
        word[1] = 0xcd;
        assert_eq!(
            DecodedValue::FixedBytes(word, 2).to_json(),
            Value::String("0xabcd".to_string())
        );
    }

    #[test]
    fn test_signed_magnitude_from_strings() {
        assert_eq!(
            DecodedValue::String("-15".to_string()).as_signed_magnitude(),
            Some((true, U256::from(15u64)))
        );
        assert_eq!(
            DecodedValue::String("0x10".to_string()).as_signed_magnitude(),
            Some((false, U256::from(16u64)))
        );
        assert_eq!(DecodedValue::String("abc".to_string()).as_signed_magnitude(), None);
    }

    #[test]
    fn test_unsupported_dyn_value() {
        let function = DynSolValue::Function(alloy::primitives::Function::ZERO);
        assert!(DecodedValue::try_from(function).is_err());
    }
}
