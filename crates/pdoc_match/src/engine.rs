use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{Level, info};

use crate::error::MatchError;
use crate::registry::{PropertyRecord, Registry};
use crate::similarity::{ratio, token_sort_ratio};

/// The three registry columns a document can be matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    CertNumber,
    Address,
    HouseNumber,
}

impl MatchField {
    pub const ALL: [MatchField; 3] = [
        MatchField::CertNumber,
        MatchField::Address,
        MatchField::HouseNumber,
    ];

    /// Addresses tolerate token reordering; identifiers do not.
    fn similarity(self, a: &str, b: &str) -> f64 {
        match self {
            MatchField::Address => token_sort_ratio(a, b),
            MatchField::CertNumber | MatchField::HouseNumber => ratio(a, b),
        }
    }

    fn column<'a>(self, record: &'a PropertyRecord) -> Option<&'a str> {
        match self {
            MatchField::CertNumber => record.cert_number.as_deref(),
            MatchField::Address => record.address.as_deref(),
            MatchField::HouseNumber => record.house_number.as_deref(),
        }
    }
}

/// Extracted key values a document brings to matching. Absent values skip
/// that field's lookup; they are never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyFields {
    pub cert_number: Option<String>,
    pub address: Option<String>,
    pub house_number: Option<String>,
}

impl KeyFields {
    fn value(&self, field: MatchField) -> Option<&str> {
        match field {
            MatchField::CertNumber => self.cert_number.as_deref(),
            MatchField::Address => self.address.as_deref(),
            MatchField::HouseNumber => self.house_number.as_deref(),
        }
    }
}

/// One registry row that cleared the similarity threshold for some field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub property_id: String,
    pub matched_field: MatchField,
    /// Similarity in [0, 1] for the single field that produced this entry.
    pub similarity: f64,
    pub record: PropertyRecord,
}

/// Per-field result lists, before merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMatches {
    pub cert_number: Vec<MatchCandidate>,
    pub address: Vec<MatchCandidate>,
    pub house_number: Vec<MatchCandidate>,
}

/// Merged matching outcome for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Deduplicated union across fields, best similarity first, capped at
    /// `top_n`.
    pub all_matches: Vec<MatchCandidate>,
    pub best_match: Option<MatchCandidate>,
    /// `best_match` when its similarity also clears the shared threshold.
    pub auto_match: Option<MatchCandidate>,
    pub field_matches: FieldMatches,
}

/// Matcher configuration: one shared similarity threshold and the per-field
/// result cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default = "MatchConfig::default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "MatchConfig::default_top_n")]
    pub top_n: usize,
}

impl MatchConfig {
    pub(crate) fn default_similarity_threshold() -> f64 {
        0.8
    }

    pub(crate) fn default_top_n() -> usize {
        3
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(MatchError::InvalidConfig(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.top_n == 0 {
            return Err(MatchError::InvalidConfig(
                "top_n must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: Self::default_similarity_threshold(),
            top_n: Self::default_top_n(),
        }
    }
}

/// Fuzzy matcher over an in-memory registry.
#[derive(Debug)]
pub struct FuzzyMatcher {
    cfg: MatchConfig,
    registry: Option<Registry>,
}

impl FuzzyMatcher {
    pub fn new(cfg: MatchConfig) -> Result<Self, MatchError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            registry: None,
        })
    }

    pub fn with_registry(cfg: MatchConfig, registry: Registry) -> Result<Self, MatchError> {
        let mut matcher = Self::new(cfg)?;
        matcher.load_registry(registry);
        Ok(matcher)
    }

    /// Install or replace the registry wholesale.
    pub fn load_registry(&mut self, registry: Registry) {
        info!(records = registry.len(), "registry_installed");
        self.registry = Some(registry);
    }

    pub fn registry_loaded(&self) -> bool {
        self.registry.is_some()
    }

    fn registry(&self) -> Result<&Registry, MatchError> {
        self.registry.as_ref().ok_or(MatchError::RegistryNotLoaded)
    }

    /// All registry rows whose `field` column is at least
    /// `similarity_threshold` similar to `value`, best first, capped at
    /// `top_n`.
    pub fn match_by_field(
        &self,
        field: MatchField,
        value: &str,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        let registry = self.registry()?;
        let mut hits: Vec<MatchCandidate> = registry
            .records()
            .iter()
            .filter_map(|record| {
                let column = field.column(record)?;
                let similarity = field.similarity(value, column);
                (similarity >= self.cfg.similarity_threshold).then(|| MatchCandidate {
                    property_id: record.property_id.clone(),
                    matched_field: field,
                    similarity,
                    record: record.clone(),
                })
            })
            .collect();
        sort_by_similarity(&mut hits);
        hits.truncate(self.cfg.top_n);
        Ok(hits)
    }

    /// Match a document's key fields against the registry.
    ///
    /// Each present field is looked up independently; the union is sorted
    /// by similarity and deduplicated by `property_id`, keeping each row's
    /// best single-field similarity — scores are never summed across
    /// fields.
    pub fn match_document(&self, key_fields: &KeyFields) -> Result<MatchOutcome, MatchError> {
        let start = Instant::now();
        let span = tracing::span!(Level::INFO, "match.document");
        let _guard = span.enter();

        // fail fast before any per-field work
        self.registry()?;

        let mut field_matches = FieldMatches::default();
        for field in MatchField::ALL {
            let Some(value) = key_fields.value(field) else {
                continue;
            };
            let hits = self.match_by_field(field, value)?;
            match field {
                MatchField::CertNumber => field_matches.cert_number = hits,
                MatchField::Address => field_matches.address = hits,
                MatchField::HouseNumber => field_matches.house_number = hits,
            }
        }

        let mut merged: Vec<MatchCandidate> = field_matches
            .cert_number
            .iter()
            .chain(&field_matches.address)
            .chain(&field_matches.house_number)
            .cloned()
            .collect();
        sort_by_similarity(&mut merged);

        let mut seen = HashSet::new();
        merged.retain(|candidate| seen.insert(candidate.property_id.clone()));

        let best_match = merged.first().cloned();
        let auto_match = best_match
            .as_ref()
            .filter(|best| best.similarity >= self.cfg.similarity_threshold)
            .cloned();

        merged.truncate(self.cfg.top_n);

        let elapsed_micros = start.elapsed().as_micros();
        info!(
            matches = merged.len(),
            auto = auto_match.is_some(),
            elapsed_micros,
            "match_complete"
        );

        Ok(MatchOutcome {
            all_matches: merged,
            best_match,
            auto_match,
            field_matches,
        })
    }
}

fn sort_by_similarity(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
