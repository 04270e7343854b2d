//! Response classification.
//!
//! A controller reply is an acknowledgment iff it contains `ok`
//! (case-insensitive). What happens to every other line depends on the
//! [`ResponsePolicy`].

use serde::{Deserialize, Serialize};

/// Classified controller reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    /// The oldest in-flight command was accepted.
    Acknowledged,
    /// Fatal error report; carries the trimmed reply verbatim.
    Error(String),
    /// Neither; safe to skip.
    Informational,
}

/// How non-acknowledgment replies are treated while streaming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePolicy {
    /// Every non-blank reply without `ok` aborts the stream.
    #[default]
    Strict,
    /// Only replies starting with `error` or `alarm` abort; other
    /// non-ok chatter (status reports, feedback messages) is skipped.
    Lenient,
}

impl ResponsePolicy {
    /// Classify a trimmed response line.
    pub fn classify(self, line: &str) -> ResponseClass {
        // A whitespace-only reply is not an error report under either policy.
        if line.is_empty() {
            return ResponseClass::Informational;
        }

        let lower = line.to_ascii_lowercase();
        if lower.contains("ok") {
            return ResponseClass::Acknowledged;
        }

        match self {
            ResponsePolicy::Strict => ResponseClass::Error(line.to_string()),
            ResponsePolicy::Lenient => {
                if lower.starts_with("error") || lower.starts_with("alarm") {
                    ResponseClass::Error(line.to_string())
                } else {
                    ResponseClass::Informational
                }
            }
        }
    }
}

/// Trim the whitespace a controller wraps around its replies.
pub fn trim_response(raw: &str) -> &str {
    raw.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

/// Classify a raw reply under the strict policy.
pub fn classify(line: &str) -> ResponseClass {
    ResponsePolicy::Strict.classify(trim_response(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_acknowledged_case_insensitive() {
        assert_eq!(classify("ok\r\n"), ResponseClass::Acknowledged);
        assert_eq!(classify("OK"), ResponseClass::Acknowledged);
        assert_eq!(classify("  Ok  "), ResponseClass::Acknowledged);
        // Substring match.
        assert_eq!(classify("[MSG:ok done]"), ResponseClass::Acknowledged);
    }

    #[test]
    fn test_strict_non_ok_is_error_verbatim() {
        assert_eq!(
            classify("error:9\r\n"),
            ResponseClass::Error("error:9".to_string())
        );
        assert_eq!(
            classify("<Idle|MPos:0.000,0.000,0.000>"),
            ResponseClass::Error("<Idle|MPos:0.000,0.000,0.000>".to_string())
        );
    }

    #[test]
    fn test_blank_is_informational() {
        assert_eq!(classify("\r\n"), ResponseClass::Informational);
        assert_eq!(
            ResponsePolicy::Lenient.classify(""),
            ResponseClass::Informational
        );
    }

    #[test]
    fn test_lenient_skips_chatter() {
        let policy = ResponsePolicy::Lenient;
        assert_eq!(
            policy.classify("<Run|MPos:1.000,0.000,0.000>"),
            ResponseClass::Informational
        );
        assert_eq!(
            policy.classify("[MSG:Pgm End]"),
            ResponseClass::Informational
        );
        assert_eq!(policy.classify("ok"), ResponseClass::Acknowledged);
    }

    #[test]
    fn test_lenient_still_aborts_on_error_and_alarm() {
        let policy = ResponsePolicy::Lenient;
        assert_eq!(
            policy.classify("error:20"),
            ResponseClass::Error("error:20".to_string())
        );
        assert_eq!(
            policy.classify("ALARM:1"),
            ResponseClass::Error("ALARM:1".to_string())
        );
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ResponsePolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"lenient\"").unwrap();
        assert_eq!(w.policy, ResponsePolicy::Lenient);
        assert_eq!(ResponsePolicy::default(), ResponsePolicy::Strict);
    }
}
