use alloy::dyn_abi::{DynSolType, Specifier};
use alloy::json_abi::Event;
use alloy::primitives::{keccak256, B256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("Invalid event signature: {0}")]
    InvalidSignature(String),
    #[error("Failed to parse type '{0}': {1}")]
    TypeParse(String, String),
    #[error("Missing closing parenthesis")]
    MissingCloseParen,
}

/// Parsed event parameter
#[derive(Debug, Clone)]
pub struct EventParam {
    /// Empty for unnamed parameters.
    pub name: String,
    pub param_type: DynSolType,
    /// Canonical type string as used in the selector, e.g. `uint256` or `(address,uint256)[]`.
    pub type_string: String,
    pub indexed: bool,
}

/// Parsed event definition
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub name: String,
    /// Canonical signature, e.g. `Transfer(address,uint256)`.
    pub signature: String,
    pub topic0: B256,
    pub params: Vec<EventParam>,
    pub anonymous: bool,
}

impl ParsedEvent {
    /// Parse a human-readable signature such as
    /// `event Transfer(address indexed from, address indexed to, uint256 value)`.
    ///
    /// The leading `event` keyword is optional and a trailing `anonymous`
    /// marks the event as anonymous.
    pub fn from_signature(signature: &str) -> Result<Self, EventParseError> {
        let signature = signature.trim();
        let signature = signature
            .strip_prefix("event ")
            .map(str::trim_start)
            .unwrap_or(signature);

        // Find the event name (everything before first '(')
        let open_paren = signature
            .find('(')
            .ok_or_else(|| EventParseError::InvalidSignature(signature.to_string()))?;

        let name = signature[..open_paren].trim().to_string();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(EventParseError::InvalidSignature(signature.to_string()));
        }

        let close_paren = find_matching_close_paren(signature, open_paren)
            .ok_or(EventParseError::MissingCloseParen)?;

        let anonymous = match signature[close_paren + 1..].trim() {
            "" => false,
            "anonymous" => true,
            trailing => {
                return Err(EventParseError::InvalidSignature(format!(
                    "Unexpected trailing input '{}' in {}",
                    trailing, signature
                )))
            }
        };

        let params = parse_params(&signature[open_paren + 1..close_paren])?;

        // Build canonical signature (types only, no names, no "indexed")
        let type_strings: Vec<&str> = params.iter().map(|p| p.type_string.as_str()).collect();
        let canonical_signature = format!("{}({})", name, type_strings.join(","));
        let topic0 = keccak256(canonical_signature.as_bytes());

        Ok(ParsedEvent {
            name,
            signature: canonical_signature,
            topic0,
            params,
            anonymous,
        })
    }

    /// Build from a JSON ABI event fragment.
    pub fn from_json_event(event: &Event) -> Result<Self, EventParseError> {
        let params = event
            .inputs
            .iter()
            .map(|input| {
                let param_type: DynSolType = input.resolve().map_err(|e| {
                    EventParseError::TypeParse(input.ty.clone(), e.to_string())
                })?;
                Ok(EventParam {
                    name: input.name.clone(),
                    type_string: param_type.sol_type_name().into_owned(),
                    param_type,
                    indexed: input.indexed,
                })
            })
            .collect::<Result<Vec<_>, EventParseError>>()?;

        Ok(ParsedEvent {
            name: event.name.clone(),
            signature: event.signature(),
            topic0: event.selector(),
            params,
            anonymous: event.anonymous,
        })
    }

    /// Get indexed parameters
    pub fn indexed_params(&self) -> Vec<&EventParam> {
        self.params.iter().filter(|p| p.indexed).collect()
    }

    /// Get non-indexed (data) parameters
    pub fn data_params(&self) -> Vec<&EventParam> {
        self.params.iter().filter(|p| !p.indexed).collect()
    }
}

fn find_matching_close_paren(s: &str, open_idx: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices().skip_while(|(i, _)| *i < open_idx) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split by commas at nesting depth zero.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parse the parameter list from an event signature
fn parse_params(params_str: &str) -> Result<Vec<EventParam>, EventParseError> {
    split_top_level(params_str)
        .into_iter()
        .map(parse_single_param)
        .collect()
}

/// Separate the type (which may be a parenthesised tuple with an array
/// suffix) from the words that follow it.
fn split_type_and_rest(param_str: &str) -> Result<(&str, &str), EventParseError> {
    let type_end = if param_str.starts_with('(') {
        let close = find_matching_close_paren(param_str, 0).ok_or(EventParseError::MissingCloseParen)?;
        param_str[close..]
            .find(char::is_whitespace)
            .map(|i| close + i)
            .unwrap_or(param_str.len())
    } else {
        param_str
            .find(char::is_whitespace)
            .unwrap_or(param_str.len())
    };
    Ok((&param_str[..type_end], param_str[type_end..].trim()))
}

/// Canonical form of a type string: component names stripped from tuples and
/// `uint`/`int` expanded to their 256-bit forms.
fn canonical_type(type_str: &str) -> Result<String, EventParseError> {
    if type_str.starts_with('(') {
        let close = find_matching_close_paren(type_str, 0).ok_or(EventParseError::MissingCloseParen)?;
        let components = split_top_level(&type_str[1..close])
            .into_iter()
            .map(|component| {
                let (ty, _name) = split_type_and_rest(component)?;
                canonical_type(ty)
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(format!("({}){}", components.join(","), &type_str[close + 1..]));
    }

    let (base, suffix) = match type_str.find('[') {
        Some(idx) => type_str.split_at(idx),
        None => (type_str, ""),
    };
    let base = match base {
        "uint" => "uint256",
        "int" => "int256",
        other => other,
    };
    Ok(format!("{}{}", base, suffix))
}

/// Parse a single parameter like "address indexed from" or "uint256 value"
fn parse_single_param(param_str: &str) -> Result<EventParam, EventParseError> {
    let (raw_type, rest) = split_type_and_rest(param_str)?;
    let parts: Vec<&str> = rest.split_whitespace().collect();

    let (indexed, name) = match parts.as_slice() {
        [] => (false, String::new()),
        ["indexed"] => (true, String::new()),
        [name] => (false, name.to_string()),
        ["indexed", name] => (true, name.to_string()),
        _ => {
            return Err(EventParseError::InvalidSignature(format!(
                "Invalid parameter format: {}",
                param_str
            )))
        }
    };

    let type_string = canonical_type(raw_type)?;
    let param_type = DynSolType::parse(&type_string)
        .map_err(|e| EventParseError::TypeParse(type_string.clone(), e.to_string()))?;

    Ok(EventParam {
        name,
        param_type,
        type_string,
        indexed,
    })
}
