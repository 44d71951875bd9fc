// Regex-based scrubbing of sensitive content from collected output

use std::borrow::Cow;

use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CollectError;

/// Replacement used when a rule does not name its own.
pub const DEFAULT_REPLACE: &str = "<REDACTED>";

/// One pattern -> replacement rule, compiled once at construction.
///
/// Replacements may use capture-group back-references (`$1`, `${name}`).
#[derive(Debug, Clone)]
pub struct Redact {
    pub id: String,
    matcher: Regex,
    replace: String,
}

impl Redact {
    /// Compile a rule. A bad pattern is a construction-time error; it can
    /// never surface mid-run.
    pub fn new(
        pattern: &str,
        id: Option<String>,
        replace: Option<String>,
    ) -> Result<Self, CollectError> {
        let matcher = Regex::new(pattern).map_err(|source| CollectError::InvalidMatcher {
            matcher: pattern.to_string(),
            source,
        })?;
        let id = match id {
            Some(id) if !id.is_empty() => id,
            _ => derive_id(pattern),
        };
        Ok(Redact {
            id,
            matcher,
            replace: replace.unwrap_or_else(|| DEFAULT_REPLACE.to_string()),
        })
    }

    fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.matcher.replace_all(input, self.replace.as_str())
    }
}

/// Rule IDs default to a digest of the pattern so two runs of the same
/// config produce the same manifest.
fn derive_id(pattern: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pattern.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

/// Compile a chain from bare patterns with default replacements.
pub fn chain<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Redact>, CollectError> {
    patterns
        .iter()
        .map(|p| Redact::new(p.as_ref(), None, None))
        .collect()
}

/// Runner-level rules run first, then the agent-wide ones appended after.
pub fn merged(runner: &[Redact], global: &[Redact]) -> Vec<Redact> {
    let mut all = Vec::with_capacity(runner.len() + global.len());
    all.extend_from_slice(runner);
    all.extend_from_slice(global);
    all
}

/// Apply every rule in chain order. Later rules see earlier rules' output.
/// An empty chain is a borrowed, byte-identical passthrough, and a rule
/// that matches nothing allocates nothing.
pub fn apply<'a>(chain: &[Redact], input: &'a str) -> Cow<'a, str> {
    let mut out = Cow::Borrowed(input);
    for rule in chain {
        let replaced = match rule.apply(&out) {
            Cow::Owned(replaced) => Some(replaced),
            Cow::Borrowed(_) => None,
        };
        if let Some(replaced) = replaced {
            out = Cow::Owned(replaced);
        }
    }
    out
}

/// Recurse through a JSON value and scrub string leaves in place. Numbers,
/// booleans, nulls, and the key set are left untouched.
pub fn apply_value(chain: &[Redact], value: &mut Value) {
    if chain.is_empty() {
        return;
    }
    match value {
        Value::String(s) => {
            let replaced = match apply(chain, s) {
                Cow::Owned(replaced) => Some(replaced),
                Cow::Borrowed(_) => None,
            };
            if let Some(replaced) = replaced {
                *s = replaced;
            }
        }
        Value::Array(items) => {
            for item in items {
                apply_value(chain, item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                apply_value(chain, v);
            }
        }
        _ => {}
    }
}

/// Patterns every run scrubs regardless of configuration: bearer tokens,
/// `password=...` pairs, and PEM private key blocks.
pub fn defaults() -> Vec<Redact> {
    let rules = [
        (r"(?i)bearer\s+[a-z0-9._\-]+", "Bearer <REDACTED>"),
        (r#"(?i)(password|passwd|secret_key|api_key)\s*[=:]\s*[^\s,;"']+"#, "$1=<REDACTED>"),
        (
            r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----",
            "<REDACTED PRIVATE KEY>",
        ),
    ];
    rules
        .iter()
        .map(|(pattern, replace)| {
            // compiled from literals above, cannot fail
            Redact::new(pattern, None, Some((*replace).to_string()))
                .expect("built-in redaction pattern")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_empty_chain_is_borrowed_passthrough() {
        let input = "password=hunter2 and some bytes \u{1f512}";
        let out = apply(&[], input);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, input);
    }

    #[test]
    fn test_simple_replacement() {
        let chain = vec![Redact::new("secret", None, None).unwrap()];
        let out = apply(&chain, "secret secret_1");
        assert_eq!(out, "<REDACTED> <REDACTED>_1");
    }

    #[test]
    fn test_capture_group_backreference() {
        let chain = vec![Redact::new(
            r"token=(\S+) issued to (\S+)",
            None,
            Some("token=<REDACTED> issued to $2".to_string()),
        )
        .unwrap()];
        let out = apply(&chain, "token=abc123 issued to alice");
        assert_eq!(out, "token=<REDACTED> issued to alice");
    }

    #[test]
    fn test_later_rules_see_earlier_output() {
        let chain = vec![
            Redact::new("secret", None, Some("hidden".to_string())).unwrap(),
            Redact::new("hidden", None, None).unwrap(),
        ];
        assert_eq!(apply(&chain, "secret"), "<REDACTED>");
    }

    #[test]
    fn test_json_redaction_preserves_structure() {
        let chain = vec![Redact::new("secret", None, None).unwrap()];
        let mut value = json!({"host": "secret-host", "port": 8200});
        apply_value(&chain, &mut value);
        assert_eq!(value, json!({"host": "<REDACTED>-host", "port": 8200}));
    }

    #[test]
    fn test_json_redaction_recurses_into_arrays() {
        let chain = vec![Redact::new("secret", None, None).unwrap()];
        let mut value = json!({"peers": ["secret-1", {"addr": "secret-2", "up": true}]});
        apply_value(&chain, &mut value);
        assert_eq!(
            value,
            json!({"peers": ["<REDACTED>-1", {"addr": "<REDACTED>-2", "up": true}]})
        );
    }

    #[test]
    fn test_invalid_matcher_is_construction_error() {
        let err = Redact::new("se(cret", None, None).unwrap_err();
        assert!(matches!(err, CollectError::InvalidMatcher { .. }));
        assert!(err.to_string().contains("se(cret"));
    }

    #[test]
    fn test_id_derived_from_pattern() {
        let a = Redact::new("secret", None, None).unwrap();
        let b = Redact::new("secret", None, None).unwrap();
        let c = Redact::new("other", None, None).unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 12);

        let named = Redact::new("secret", Some("tokens".to_string()), None).unwrap();
        assert_eq!(named.id, "tokens");
    }

    #[test]
    fn test_merged_keeps_runner_rules_first() {
        let runner = vec![Redact::new("a", Some("runner".to_string()), None).unwrap()];
        let global = vec![Redact::new("b", Some("global".to_string()), None).unwrap()];
        let all = merged(&runner, &global);
        assert_eq!(all[0].id, "runner");
        assert_eq!(all[1].id, "global");
    }

    #[test]
    fn test_default_rules_scrub_common_secrets() {
        let chain = defaults();
        let out = apply(&chain, "Authorization: Bearer hvs.CAESIJ5 password=swordfish");
        assert!(!out.contains("hvs.CAESIJ5"));
        assert!(!out.contains("swordfish"));
        assert!(out.contains("Bearer <REDACTED>"));
        assert!(out.contains("password=<REDACTED>"));
    }
}
