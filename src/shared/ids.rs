use getrandom::getrandom;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const WORKFLOW_SUFFIX_LEN: usize = 9;

pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-' or '_'"
    ))
}

/// Opaque name of one workflow attempt, minted by the client at start time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn parse(raw: &str) -> Result<Self, String> {
        validate_identifier_value("workflow id", raw)?;
        Ok(Self(raw.to_string()))
    }

    /// Mints `workflow_<unix-millis>_<9 base36 chars>`.
    pub fn generate(now_millis: i64) -> Result<Self, String> {
        let timestamp = u64::try_from(now_millis)
            .map_err(|_| "workflow id generation requires a non-negative timestamp".to_string())?;
        let mut bytes = [0_u8; WORKFLOW_SUFFIX_LEN];
        getrandom(&mut bytes)
            .map_err(|err| format!("failed to generate workflow id randomness: {err}"))?;
        let suffix: String = bytes
            .iter()
            .map(|byte| BASE36_ALPHABET[(*byte as usize) % BASE36_ALPHABET.len()] as char)
            .collect();
        Ok(Self(format!("workflow_{timestamp}_{suffix}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::borrow::Borrow<str> for WorkflowId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for WorkflowId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl<'de> Deserialize<'de> for WorkflowId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .map_err(|err| D::Error::custom(format!("invalid workflow id `{raw}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_timestamp_and_fixed_suffix() {
        let id = WorkflowId::generate(1_700_000_000_123).expect("generate");
        let raw = id.as_str();
        assert!(raw.starts_with("workflow_1700000000123_"));
        let suffix = raw.rsplit('_').next().expect("suffix");
        assert_eq!(suffix.len(), WORKFLOW_SUFFIX_LEN);
        assert!(WorkflowId::parse(raw).is_ok());
    }

    #[test]
    fn negative_timestamps_are_rejected() {
        assert!(WorkflowId::generate(-1).is_err());
    }
}
