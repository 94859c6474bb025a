use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::field::FieldKind;

/// Char offset at which position decay bottoms out at its 0.1 floor.
/// Fixed across documents; never re-derived from document length.
const POSITION_SATURATION: f64 = 10_000.0;

/// Candidates scoring within this distance of the leader count as tied, and
/// the money/address domain bias may pick among them.
const TIE_BAND: f64 = 0.05;

const WEIGHT_FORMAT: f64 = 0.3;
const WEIGHT_CONTEXT: f64 = 0.3;
const WEIGHT_POSITION: f64 = 0.2;
const WEIGHT_SHAPE: f64 = 0.2;

/// A candidate with its composite selection score and the per-signal
/// components that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    /// Weighted composite in [0, 1].
    pub score: f64,
    pub format_score: f64,
    pub context_score: f64,
    pub position_score: f64,
    pub shape_score: f64,
}

pub(crate) fn score_candidate(
    kind: FieldKind,
    candidate: &Candidate,
    canonical: Option<&Regex>,
) -> ScoredCandidate {
    let format_score = match canonical {
        Some(re) if re.is_match(&candidate.value) => 1.0,
        Some(_) => 0.5,
        None => 0.8,
    };
    let context_score = context_score(kind, candidate);
    let position_score = (1.0 - candidate.start as f64 / POSITION_SATURATION).max(0.1);
    let shape_score = shape_confidence(&candidate.value);

    let score = WEIGHT_FORMAT * format_score
        + WEIGHT_CONTEXT * context_score
        + WEIGHT_POSITION * position_score
        + WEIGHT_SHAPE * shape_score;

    ScoredCandidate {
        candidate: candidate.clone(),
        score,
        format_score,
        context_score,
        position_score,
        shape_score,
    }
}

/// Fraction of the field's keyword set present in the surrounding context.
fn context_score(kind: FieldKind, candidate: &Candidate) -> f64 {
    let keywords = kind.context_keywords();
    if keywords.is_empty() {
        return 0.0;
    }
    let found = keywords
        .iter()
        .filter(|kw| candidate.pre_context.contains(**kw) || candidate.post_context.contains(**kw))
        .count();
    (found as f64 / keywords.len() as f64).min(1.0)
}

/// Crude plausibility signal from the value's surface shape.
fn shape_confidence(value: &str) -> f64 {
    let len = value.chars().count();
    if len < 2 {
        return 0.1;
    }
    if len > 100 {
        return 0.3;
    }
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    let has_alpha = value.chars().any(char::is_alphabetic);
    let has_date_unit = value.chars().any(|c| matches!(c, '年' | '月' | '日'));
    let hits = usize::from(has_digit) + usize::from(has_alpha) + usize::from(has_date_unit);
    hits as f64 / 3.0
}

/// Leading numeric amount of a money value, commas stripped, unit ignored.
pub(crate) fn parse_amount(value: &str) -> Option<f64> {
    let leading: String = value
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    leading.parse::<f64>().ok()
}

/// Pick the best candidate for a field.
///
/// Zero candidates yield `None`; a single candidate is returned
/// unconditionally. Otherwise candidates are ranked by composite score with
/// a stable sort, so first-seen order breaks exact ties. Within the tie
/// band below the leader, money prefers the numerically largest amount and
/// address the longest value; no other field gets a bias.
pub(crate) fn select_best(
    kind: FieldKind,
    candidates: &[Candidate],
    canonical: Option<&Regex>,
) -> Option<ScoredCandidate> {
    match candidates {
        [] => None,
        [only] => Some(score_candidate(kind, only, canonical)),
        _ => {
            let mut scored: Vec<ScoredCandidate> = candidates
                .iter()
                .map(|c| score_candidate(kind, c, canonical))
                .collect();
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let band = scored
                .iter()
                .take_while(|s| s.score >= scored[0].score - TIE_BAND)
                .count();
            let pick = match kind {
                FieldKind::Money => argmax_by(&scored[..band], |s| {
                    parse_amount(&s.candidate.value).unwrap_or(f64::MIN)
                }),
                FieldKind::Address => {
                    argmax_by(&scored[..band], |s| s.candidate.value.chars().count() as f64)
                }
                _ => 0,
            };
            Some(scored.swap_remove(pick))
        }
    }
}

/// Index of the strictly greatest key; earlier entries win exact ties.
fn argmax_by<T>(items: &[T], key: impl Fn(&T) -> f64) -> usize {
    let mut best = 0;
    let mut best_key = key(&items[0]);
    for (idx, item) in items.iter().enumerate().skip(1) {
        let k = key(item);
        if k > best_key {
            best = idx;
            best_key = k;
        }
    }
    best
}
