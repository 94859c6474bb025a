use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use pdoc_rules::{RuleSet, RuleWeights, UNKNOWN_DOC_TYPE};

use crate::error::ClassifyError;

/// A rule table with every keyword and named check compiled, ready to score
/// documents. Compilation happens once per classifier, not per call.
#[derive(Debug)]
pub struct CompiledRules {
    rules: Vec<CompiledRule>,
}

#[derive(Debug)]
struct CompiledRule {
    type_name: String,
    must: Vec<Regex>,
    optional: Vec<Regex>,
    checks: Vec<Regex>,
    weights: RuleWeights,
    threshold: f64,
}

/// Outcome of scoring a document against every rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDecision {
    /// Best-scoring type, by max score with table order breaking ties.
    pub candidate: String,
    pub score: f64,
    pub threshold: f64,
    /// `score/threshold` clamped to [0, 1]; 0 or 1 when the threshold is 0.
    pub confidence: f64,
    pub passed: bool,
    /// Score per type, for diagnostics and reporting.
    pub scores: BTreeMap<String, f64>,
}

impl CompiledRules {
    /// The compiled form of [`RuleSet::fallback`]: one catch-all type with
    /// no patterns, so construction cannot fail.
    pub(crate) fn fallback() -> Self {
        Self {
            rules: vec![CompiledRule {
                type_name: UNKNOWN_DOC_TYPE.to_string(),
                must: Vec::new(),
                optional: Vec::new(),
                checks: Vec::new(),
                weights: RuleWeights::default(),
                threshold: 0.0,
            }],
        }
    }

    pub fn compile(set: &RuleSet) -> Result<Self, ClassifyError> {
        let mut rules = Vec::with_capacity(set.rules.len());
        for rule in &set.rules {
            let compile_all = |patterns: &[String]| -> Result<Vec<Regex>, ClassifyError> {
                patterns
                    .iter()
                    .map(|p| compile_keyword(&rule.type_name, p))
                    .collect()
            };
            let checks = rule
                .regex_checks
                .iter()
                .map(|name| {
                    let pattern = set.patterns.get(name).map(String::as_str).unwrap_or(name);
                    compile_keyword(name, pattern)
                })
                .collect::<Result<Vec<_>, _>>()?;

            rules.push(CompiledRule {
                type_name: rule.type_name.clone(),
                must: compile_all(&rule.must_keywords)?,
                optional: compile_all(&rule.optional_keywords)?,
                checks,
                weights: rule.weights,
                threshold: rule.threshold,
            });
        }
        Ok(Self { rules })
    }

    /// Score `text` against every rule and pick the winner.
    ///
    /// Hits are presence-based: each pattern contributes at most one hit no
    /// matter how often it occurs. A rule with non-empty must-keywords and
    /// zero must hits scores exactly 0 regardless of its other signals.
    pub fn score(&self, text: &str) -> RuleDecision {
        let mut scores = BTreeMap::new();
        let mut best: Option<(usize, f64)> = None;

        for (idx, rule) in self.rules.iter().enumerate() {
            let must_hits = count_hits(&rule.must, text);
            let score = if !rule.must.is_empty() && must_hits == 0 {
                0.0
            } else {
                rule.weights.must_keyword * must_hits as f64
                    + rule.weights.optional_keyword * count_hits(&rule.optional, text) as f64
                    + rule.weights.regex_hit * count_hits(&rule.checks, text) as f64
            };
            scores.insert(rule.type_name.clone(), score);
            // strictly-greater keeps the first rule in table order on ties
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }

        match best {
            Some((idx, score)) => {
                let rule = &self.rules[idx];
                let passed = score >= rule.threshold;
                let confidence = if rule.threshold > 0.0 {
                    (score / rule.threshold).min(1.0)
                } else if score > 0.0 {
                    1.0
                } else {
                    0.0
                };
                RuleDecision {
                    candidate: rule.type_name.clone(),
                    score,
                    threshold: rule.threshold,
                    confidence,
                    passed,
                    scores,
                }
            }
            None => RuleDecision {
                candidate: UNKNOWN_DOC_TYPE.to_string(),
                score: 0.0,
                threshold: 0.0,
                confidence: 0.0,
                passed: false,
                scores,
            },
        }
    }
}

fn compile_keyword(name: &str, pattern: &str) -> Result<Regex, ClassifyError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ClassifyError::BadRulePattern {
            name: name.to_string(),
            source,
        })
}

fn count_hits(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|re| re.is_match(text)).count()
}
