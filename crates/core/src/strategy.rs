//! Prompt strategies.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Which prompt-construction variant renders the message sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStrategy {
    /// System persona + context block, history, guardrail handshake, query.
    CustomerSupport,
    /// Caller template with `{query}` / `{context}` substitution, after history.
    Raw,
}

impl PromptStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerSupport => "customer_support",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for PromptStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "customer_support" => Ok(Self::CustomerSupport),
            "raw" => Ok(Self::Raw),
            other => Err(Error::malformed(format!(
                "unknown prompt strategy '{other}' (expected 'customer_support' or 'raw')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!(
            "customer_support".parse::<PromptStrategy>().unwrap(),
            PromptStrategy::CustomerSupport
        );
        assert_eq!(
            "Customer-Support".parse::<PromptStrategy>().unwrap(),
            PromptStrategy::CustomerSupport
        );
        assert_eq!("raw".parse::<PromptStrategy>().unwrap(), PromptStrategy::Raw);
    }

    #[test]
    fn unknown_name_is_malformed_request() {
        let err = "shakespeare".parse::<PromptStrategy>().unwrap_err();
        assert!(matches!(err, Error::MalformedRequest(_)));
        assert!(err.to_string().contains("shakespeare"));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PromptStrategy::CustomerSupport).unwrap();
        assert_eq!(json, r#""customer_support""#);
        let parsed: PromptStrategy = serde_json::from_str(r#""raw""#).unwrap();
        assert_eq!(parsed, PromptStrategy::Raw);
    }
}
