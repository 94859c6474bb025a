use std::collections::BTreeMap;
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, info};

use crate::candidate::{Candidate, back_up_chars, forward_chars};
use crate::error::ExtractError;
use crate::field::FieldKind;
use crate::score::{ScoredCandidate, select_best};

#[derive(Debug)]
struct CompiledField {
    extraction: Regex,
    canonical: Option<Regex>,
}

/// Regex-driven field extractor over cleaned document text.
///
/// All field patterns are compiled once at construction; extraction itself
/// cannot fail, it can only come back empty.
#[derive(Debug)]
pub struct Extractor {
    fields: Vec<(FieldKind, CompiledField)>,
}

/// Extraction output for one document: the selected best value per field,
/// every raw candidate, and per-page candidate breakdowns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Best value per field; fields with no candidates are absent.
    pub key_info: BTreeMap<FieldKind, String>,
    /// Every candidate per field, in match order. Empty fields are omitted.
    pub all_info: BTreeMap<FieldKind, Vec<Candidate>>,
    pub page_info: Vec<PageExtraction>,
}

/// Candidates found on a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_index: usize,
    pub info: BTreeMap<FieldKind, Vec<Candidate>>,
}

impl Extractor {
    /// Compile every field's extraction and canonical pattern.
    pub fn new() -> Result<Self, ExtractError> {
        let mut fields = Vec::with_capacity(FieldKind::ALL.len());
        for kind in FieldKind::ALL {
            let extraction =
                Regex::new(kind.extraction_pattern()).map_err(|source| ExtractError::BadPattern {
                    field: kind.name(),
                    source,
                })?;
            let canonical = kind
                .canonical_pattern()
                .map(Regex::new)
                .transpose()
                .map_err(|source| ExtractError::BadPattern {
                    field: kind.name(),
                    source,
                })?;
            fields.push((
                kind,
                CompiledField {
                    extraction,
                    canonical,
                },
            ));
        }
        Ok(Self { fields })
    }

    fn compiled(&self, kind: FieldKind) -> &CompiledField {
        // fields is built from FieldKind::ALL, which follows declaration order
        let (stored, compiled) = &self.fields[kind as usize];
        debug_assert_eq!(*stored, kind);
        compiled
    }

    /// Every non-overlapping match for one field, with context windows.
    pub fn extract_field(&self, text: &str, kind: FieldKind) -> Vec<Candidate> {
        let compiled = self.compiled(kind);
        let window = kind.context_window();
        let mut out = Vec::new();

        for caps in compiled.extraction.captures_iter(text) {
            let m = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let value = match kind {
                FieldKind::Money => compose_money_value(&caps),
                _ => last_group_value(&compiled.extraction, &caps, m.as_str()),
            };

            let pre_start = back_up_chars(text, m.start(), window);
            let post_end = forward_chars(text, m.end(), window);
            let char_start = text[..m.start()].chars().count();
            let char_end = char_start + m.as_str().chars().count();

            out.push(Candidate {
                value: value.trim().to_string(),
                full_match: m.as_str().trim().to_string(),
                pre_context: text[pre_start..m.start()].trim().to_string(),
                post_context: text[m.end()..post_end].trim().to_string(),
                start: char_start,
                end: char_end,
            });
        }
        out
    }

    /// Candidates for every field. Fields without hits are omitted.
    pub fn extract_all(&self, text: &str) -> BTreeMap<FieldKind, Vec<Candidate>> {
        let mut all = BTreeMap::new();
        for kind in FieldKind::ALL {
            let candidates = self.extract_field(text, kind);
            if !candidates.is_empty() {
                all.insert(kind, candidates);
            }
        }
        all
    }

    /// Rank one field's candidates and pick the best, if any.
    pub fn select_best(&self, kind: FieldKind, candidates: &[Candidate]) -> Option<ScoredCandidate> {
        select_best(kind, candidates, self.compiled(kind).canonical.as_ref())
    }

    /// Best value per field out of a full candidate map.
    pub fn key_info(
        &self,
        all_info: &BTreeMap<FieldKind, Vec<Candidate>>,
    ) -> BTreeMap<FieldKind, String> {
        let mut key_info = BTreeMap::new();
        for (kind, candidates) in all_info {
            if let Some(best) = self.select_best(*kind, candidates) {
                key_info.insert(*kind, best.candidate.value);
            }
        }
        key_info
    }

    /// Whole-document extraction: concatenated pages for the document-level
    /// result, plus a per-page candidate breakdown.
    pub fn extract_document(&self, pages: &[&str]) -> ExtractionResult {
        let start = Instant::now();
        let span = tracing::span!(Level::INFO, "extract.document", pages = pages.len());
        let _guard = span.enter();

        let all_text = pages.join(" ");
        let all_info = self.extract_all(&all_text);
        let key_info = self.key_info(&all_info);

        let page_info = pages
            .iter()
            .enumerate()
            .map(|(page_index, page_text)| PageExtraction {
                page_index,
                info: self.extract_all(page_text),
            })
            .collect();

        let elapsed_micros = start.elapsed().as_micros();
        info!(
            fields = key_info.len(),
            candidates = all_info.values().map(Vec::len).sum::<usize>(),
            elapsed_micros,
            "extract_complete"
        );
        debug!(?key_info, "extract_key_info");

        ExtractionResult {
            key_info,
            all_info,
            page_info,
        }
    }
}

/// Last capture group by index when the pattern has one, else the full
/// match. Mirrors how keyword-anchored patterns carry the value in their
/// trailing group.
fn last_group_value(re: &Regex, caps: &regex::Captures<'_>, full: &str) -> String {
    if re.captures_len() > 1 {
        caps.get(re.captures_len() - 1)
            .map(|g| g.as_str().to_string())
            .unwrap_or_else(|| full.to_string())
    } else {
        full.to_string()
    }
}

/// Money values are recomposed as `{amount}{unit}元` from whichever
/// alternate of the money pattern matched.
fn compose_money_value(caps: &regex::Captures<'_>) -> String {
    let amount = caps
        .name("amt_c")
        .or_else(|| caps.name("amt"))
        .map(|g| g.as_str())
        .unwrap_or_default();
    let unit = caps
        .name("unit_c")
        .or_else(|| caps.name("unit"))
        .map(|g| g.as_str())
        .unwrap_or_default();
    format!("{amount}{unit}元")
}
