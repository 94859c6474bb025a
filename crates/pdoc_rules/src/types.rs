use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Document type reported when no rule clears its threshold and no model
/// takes over.
pub const UNKNOWN_DOC_TYPE: &str = "unknown";

/// Per-signal score weights for one document-type rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RuleWeights {
    /// Score contributed by each matched must-keyword pattern.
    #[serde(default = "RuleWeights::default_must")]
    pub must_keyword: f64,
    /// Score contributed by each matched optional-keyword pattern.
    #[serde(default = "RuleWeights::default_optional")]
    pub optional_keyword: f64,
    /// Score contributed by each matched named regex check.
    #[serde(default = "RuleWeights::default_regex")]
    pub regex_hit: f64,
}

impl RuleWeights {
    pub(crate) fn default_must() -> f64 {
        10.0
    }

    pub(crate) fn default_optional() -> f64 {
        5.0
    }

    pub(crate) fn default_regex() -> f64 {
        3.0
    }
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            must_keyword: Self::default_must(),
            optional_keyword: Self::default_optional(),
            regex_hit: Self::default_regex(),
        }
    }
}

/// One document-type definition: keyword patterns, named regex checks, and
/// the score threshold the type must clear.
///
/// `must_keywords` gate the rule: when the list is non-empty and none of its
/// patterns match, the rule scores exactly zero no matter what the optional
/// keywords or regex checks found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocTypeRule {
    pub type_name: String,

    #[serde(default)]
    pub must_keywords: Vec<String>,

    #[serde(default)]
    pub optional_keywords: Vec<String>,

    /// Names referring to entries in [`RuleSet::patterns`].
    #[serde(default)]
    pub regex_checks: Vec<String>,

    #[serde(default)]
    pub weights: RuleWeights,

    #[serde(default)]
    pub threshold: f64,
}

/// A declarative table of document-type rules plus the shared named-pattern
/// table its `regex_checks` refer to.
///
/// Rule order matters: score ties between types are broken by table order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    /// Named regex patterns shared across rules.
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,

    pub rules: Vec<DocTypeRule>,
}

impl RuleSet {
    /// Parse a rule set from YAML and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuleError> {
        let set: RuleSet = serde_yaml::from_str(yaml)?;
        set.validate()?;
        Ok(set)
    }

    /// Load a rule set from a YAML file.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, RuleError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// The degraded rule table used when configuration is missing or corrupt:
    /// a single catch-all type with threshold zero.
    pub fn fallback() -> Self {
        Self {
            patterns: BTreeMap::new(),
            rules: vec![DocTypeRule {
                type_name: UNKNOWN_DOC_TYPE.to_string(),
                must_keywords: Vec::new(),
                optional_keywords: Vec::new(),
                regex_checks: Vec::new(),
                weights: RuleWeights::default(),
                threshold: 0.0,
            }],
        }
    }

    /// Validate rule shape, pattern references, and pattern syntax.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.rules.is_empty() {
            return Err(RuleError::EmptyRuleSet);
        }

        for (name, pattern) in &self.patterns {
            regex::Regex::new(pattern).map_err(|source| RuleError::BadPattern {
                name: name.clone(),
                source,
            })?;
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.type_name.trim().is_empty() {
                return Err(RuleError::EmptyTypeName { rule: idx });
            }
            if rule.threshold < 0.0 {
                return Err(RuleError::NegativeThreshold {
                    type_name: rule.type_name.clone(),
                });
            }
            for keyword in rule.must_keywords.iter().chain(&rule.optional_keywords) {
                regex::Regex::new(keyword).map_err(|source| RuleError::BadPattern {
                    name: format!("{}:{keyword}", rule.type_name),
                    source,
                })?;
            }
            for name in &rule.regex_checks {
                if !self.patterns.contains_key(name) {
                    return Err(RuleError::UnknownPatternRef {
                        type_name: rule.type_name.clone(),
                        name: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
