//! Group-name to team-name transformation.
//!
//! Backend types map logical group names to backend-side team names through
//! an ordered list of regex/template rules. The first matching rule wins;
//! capture groups substitute into the template as `$n`, and
//! `$n|replace(-,_)` additionally rewrites dashes to underscores inside the
//! captured segment. A name with no matching rule is an error — the
//! reconciler never fabricates a team name.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rule list applied when a backend type has no list of its own.
pub const DEFAULT_RULES_KEY: &str = "default";

/// One raw configuration rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    /// Regex the group name must match.
    pub input: String,
    /// Output template with `$n` capture substitution.
    pub output: String,
}

/// Transformation error.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("no pattern matched group '{name}' for backend type '{backend_type}'")]
    NoMatchingPattern { backend_type: String, name: String },
}

struct CompiledRule {
    regex: Regex,
    output: String,
}

/// Compiled transformation rules, keyed by backend type.
pub struct NameTransformer {
    rules: HashMap<String, Vec<CompiledRule>>,
    token: Regex,
}

impl NameTransformer {
    /// Compile the configured rule lists. Order within a list is preserved.
    pub fn new(config: &HashMap<String, Vec<PatternRule>>) -> Result<Self, TransformError> {
        let mut rules = HashMap::with_capacity(config.len());
        for (backend_type, raw_rules) in config {
            let mut compiled = Vec::with_capacity(raw_rules.len());
            for rule in raw_rules {
                let regex = Regex::new(&rule.input).map_err(|e| TransformError::InvalidPattern {
                    pattern: rule.input.clone(),
                    message: e.to_string(),
                })?;
                compiled.push(CompiledRule {
                    regex,
                    output: rule.output.clone(),
                });
            }
            rules.insert(backend_type.to_lowercase(), compiled);
        }

        // `$n` optionally followed by the replace(-,_) modifier.
        let token = Regex::new(r"\$(\d+)(\|replace\(-,_\))?").map_err(|e| {
            TransformError::InvalidPattern {
                pattern: r"\$(\d+)".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self { rules, token })
    }

    /// Derive the backend-side team name for `name` under `backend_type`.
    pub fn transform(&self, backend_type: &str, name: &str) -> Result<String, TransformError> {
        let rules = self
            .rules
            .get(&backend_type.to_lowercase())
            .or_else(|| self.rules.get(DEFAULT_RULES_KEY))
            .ok_or_else(|| TransformError::NoMatchingPattern {
                backend_type: backend_type.to_string(),
                name: name.to_string(),
            })?;

        for rule in rules {
            if let Some(captures) = rule.regex.captures(name) {
                let output = self.token.replace_all(&rule.output, |tokens: &regex::Captures| {
                    let index: usize = tokens[1].parse().unwrap_or(0);
                    let captured = captures
                        .get(index)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    if tokens.get(2).is_some() {
                        captured.replace('-', "_")
                    } else {
                        captured
                    }
                });
                return Ok(output.into_owned());
            }
        }

        Err(TransformError::NoMatchingPattern {
            backend_type: backend_type.to_string(),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer(entries: &[(&str, &[(&str, &str)])]) -> NameTransformer {
        let mut config = HashMap::new();
        for (backend_type, rules) in entries {
            config.insert(
                (*backend_type).to_string(),
                rules
                    .iter()
                    .map(|(input, output)| PatternRule {
                        input: (*input).to_string(),
                        output: (*output).to_string(),
                    })
                    .collect(),
            );
        }
        NameTransformer::new(&config).unwrap()
    }

    #[test]
    fn test_capture_substitution() {
        let t = transformer(&[("snowflake", &[(r"^app-(.*)$", "$1")])]);
        assert_eq!(t.transform("snowflake", "app-data-platform").unwrap(), "data-platform");
    }

    #[test]
    fn test_replace_modifier() {
        let t = transformer(&[("snowflake", &[(r"^app-(.*)$", "$1|replace(-,_)")])]);
        assert_eq!(t.transform("snowflake", "app-data-platform").unwrap(), "data_platform");
    }

    #[test]
    fn test_replace_modifier_scoped_to_capture() {
        let t = transformer(&[("snowflake", &[(r"^app-(.*)$", "role-$1|replace(-,_)")])]);
        assert_eq!(
            t.transform("snowflake", "app-data-platform").unwrap(),
            "role-data_platform"
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let t = transformer(&[(
            "fivetran",
            &[
                (r"^team-(.*)$", "first-$1"),
                (r"^team-(.*)$", "second-$1"),
                (r"^(.*)$", "fallthrough-$1"),
            ],
        )]);
        assert_eq!(t.transform("fivetran", "team-core").unwrap(), "first-core");
        assert_eq!(t.transform("fivetran", "misc").unwrap(), "fallthrough-misc");
    }

    #[test]
    fn test_deterministic() {
        let t = transformer(&[("fivetran", &[(r"^(.*)-(.*)$", "$2_$1")])]);
        for _ in 0..5 {
            assert_eq!(t.transform("fivetran", "alpha-beta").unwrap(), "beta_alpha");
        }
    }

    #[test]
    fn test_default_rules_for_unknown_type() {
        let t = transformer(&[
            ("default", &[(r"^(.*)$", "$1")]),
            ("snowflake", &[(r"^app-(.*)$", "$1")]),
        ]);
        assert_eq!(t.transform("rover", "data-platform").unwrap(), "data-platform");
    }

    #[test]
    fn test_no_match_is_error() {
        let t = transformer(&[("snowflake", &[(r"^app-(.*)$", "$1")])]);
        let err = t.transform("snowflake", "misc-group").unwrap_err();
        assert!(matches!(err, TransformError::NoMatchingPattern { .. }));
    }

    #[test]
    fn test_no_rules_at_all_is_error() {
        let t = transformer(&[]);
        assert!(t.transform("snowflake", "anything").is_err());
    }

    #[test]
    fn test_invalid_regex_rejected_at_compile() {
        let mut config = HashMap::new();
        config.insert(
            "snowflake".to_string(),
            vec![PatternRule {
                input: "(".to_string(),
                output: "$1".to_string(),
            }],
        );
        assert!(matches!(
            NameTransformer::new(&config),
            Err(TransformError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_type_lookup_case_insensitive() {
        let t = transformer(&[("Snowflake", &[(r"^(.*)$", "$1")])]);
        assert_eq!(t.transform("SNOWFLAKE", "g").unwrap(), "g");
    }
}
