use thiserror::Error;

/// Errors raised while loading or validating a rule table.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rule file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse rule YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("rule set declares no rules")]
    EmptyRuleSet,

    #[error("rule `{rule}` has an empty type_name")]
    EmptyTypeName { rule: usize },

    #[error("rule `{type_name}` has a negative threshold")]
    NegativeThreshold { type_name: String },

    #[error("rule `{type_name}` references undeclared pattern `{name}`")]
    UnknownPatternRef { type_name: String, name: String },

    #[error("pattern `{name}` does not compile: {source}")]
    BadPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}
