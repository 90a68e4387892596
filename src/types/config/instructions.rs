use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Target representation for a decoded event argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    /// Smallest-unit integer rendered as a decimal ether amount.
    Eth,
    Number,
    Int,
    /// bytes32 holding NUL-padded text.
    String,
    Hex,
    Boolean,
}

/// Per-argument instruction as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArgInstructionConfig {
    #[serde(default)]
    pub arg_type: Option<ArgType>,
    #[serde(default)]
    pub is_distinct_id: bool,
}

/// `eventName -> argName -> instruction`
pub type RawParsingInstructions = HashMap<String, HashMap<String, ArgInstructionConfig>>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InstructionsOrPath {
    Inline(RawParsingInstructions),
    Path(String),
}

pub fn load_instructions_from_path(
    base_dir: &Path,
    path: &str,
) -> anyhow::Result<RawParsingInstructions> {
    let full_path = base_dir.join(path);
    let content = std::fs::read_to_string(&full_path).with_context(|| {
        format!(
            "Failed to read event parsing instructions at {}",
            full_path.display()
        )
    })?;
    serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse event parsing instructions at {}",
            full_path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instructions() {
        let json = r#"{
            "Transfer": {
                "to": { "isDistinctId": true },
                "amount": { "argType": "eth" }
            }
        }"#;
        let parsed: RawParsingInstructions = serde_json::from_str(json).unwrap();

        let transfer = &parsed["Transfer"];
        assert!(transfer["to"].is_distinct_id);
        assert_eq!(transfer["to"].arg_type, None);
        assert_eq!(transfer["amount"].arg_type, Some(ArgType::Eth));
        assert!(!transfer["amount"].is_distinct_id);
    }

    #[test]
    fn test_unknown_arg_type_rejected() {
        let json = r#"{ "Transfer": { "amount": { "argType": "wei" } } }"#;
        assert!(serde_json::from_str::<RawParsingInstructions>(json).is_err());
    }
}
