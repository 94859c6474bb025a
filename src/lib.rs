//! Umbrella crate for propdoc: property-document understanding.
//!
//! This crate stitches the stage crates together so callers can go from
//! cleaned page text to a full document report — type, extracted key
//! fields, and registry match — with a single API entry point.

pub use pdoc_classify::{
    Classification, ClassifyConfig, ClassifyError, ClassifyMethod, DocumentClassification,
    HybridClassifier, PageClassification, SamplePool, SampleStore, TrainError, TrainMode,
    TrainReport,
};
pub use pdoc_extract::{
    Candidate, ExtractError, ExtractionResult, Extractor, FieldKind, PageExtraction,
    ScoredCandidate, validate,
};
pub use pdoc_match::{
    FieldMatches, FuzzyMatcher, KeyFields, MatchCandidate, MatchConfig, MatchError, MatchField,
    MatchOutcome, PropertyRecord, Registry,
};
pub use pdoc_rules::{DocTypeRule, RuleError, RuleSet, RuleWeights, UNKNOWN_DOC_TYPE};

mod config;

pub use crate::config::{ConfigLoadError, MatcherSection, PropdocConfig};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One OCR'd page after external cleaning: the unit of input to the
/// pipeline. `confidence` is the OCR engine's own estimate and is carried
/// through for reporting, not consulted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanPage {
    pub page_index: usize,
    pub cleaned_text: String,
    pub confidence: f64,
}

/// Errors that can occur while assembling or running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigLoadError),

    #[error("extractor construction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("classifier error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("matching failed: {0}")]
    Match(#[from] MatchError),
}

/// Everything the pipeline produced for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub classification: DocumentClassification,
    pub extraction: ExtractionResult,
    /// Absent when no registry is configured.
    pub match_result: Option<MatchOutcome>,
}

/// The assembled pipeline: extractor, classifier, and (when a registry is
/// configured) matcher. One instance per worker; instances share nothing
/// except the externally persisted sample pool and model artifact.
#[derive(Debug)]
pub struct DocumentPipeline {
    extractor: Extractor,
    classifier: HybridClassifier,
    matcher: Option<FuzzyMatcher>,
}

impl DocumentPipeline {
    /// Build a pipeline from configuration. Rule/model load failures
    /// degrade inside the classifier; a configured-but-unreadable registry
    /// is an error, since matching was explicitly requested.
    pub fn from_config(config: &PropdocConfig) -> Result<Self, PipelineError> {
        let extractor = Extractor::new()?;
        let classifier = HybridClassifier::open(config.classify.clone());
        let matcher = match &config.matcher.registry_path {
            Some(path) => {
                let registry = Registry::from_csv_path(path)?;
                Some(FuzzyMatcher::with_registry(
                    config.matcher.config.clone(),
                    registry,
                )?)
            }
            None => None,
        };
        Ok(Self {
            extractor,
            classifier,
            matcher,
        })
    }

    /// Build from pre-assembled parts (callers that load their own
    /// registry or rules).
    pub fn new(
        extractor: Extractor,
        classifier: HybridClassifier,
        matcher: Option<FuzzyMatcher>,
    ) -> Self {
        Self {
            extractor,
            classifier,
            matcher,
        }
    }

    /// Install or replace the matcher's registry after construction.
    pub fn load_registry(&mut self, config: MatchConfig, registry: Registry) -> Result<(), PipelineError> {
        match &mut self.matcher {
            Some(matcher) => matcher.load_registry(registry),
            None => self.matcher = Some(FuzzyMatcher::with_registry(config, registry)?),
        }
        Ok(())
    }

    /// Run the full pipeline over one document's cleaned pages.
    pub fn process_pages(&mut self, pages: &[CleanPage]) -> Result<DocumentReport, PipelineError> {
        let texts: Vec<&str> = pages.iter().map(|p| p.cleaned_text.as_str()).collect();

        let classification = self.classifier.classify_pages(&texts);
        let extraction = self.extractor.extract_document(&texts);

        let match_result = match &self.matcher {
            Some(matcher) => {
                let key_fields = key_fields_from(&extraction);
                let outcome = matcher.match_document(&key_fields)?;
                match &outcome.auto_match {
                    Some(auto) => info!(property_id = %auto.property_id, "auto_match_found"),
                    None => info!("no_auto_match"),
                }
                Some(outcome)
            }
            None => {
                warn!("registry not configured; skipping match step");
                None
            }
        };

        Ok(DocumentReport {
            classification,
            extraction,
            match_result,
        })
    }

    /// Record an operator-verified document type. The label enters the
    /// sample pool at maximum confidence and may trigger auto-training.
    pub fn verify_document(&mut self, pages: &[CleanPage], label: &str) -> Classification {
        let texts: Vec<&str> = pages.iter().map(|p| p.cleaned_text.as_str()).collect();
        let all_text = texts.join(" ");
        self.classifier.classify_verified(&all_text, label)
    }

    /// Retrain the classifier's model from the accumulated sample pool.
    pub fn train(&mut self, mode: TrainMode) -> Result<TrainReport, TrainError> {
        self.classifier.train_model(mode)
    }

    pub fn classifier(&self) -> &HybridClassifier {
        &self.classifier
    }

    pub fn matcher_available(&self) -> bool {
        self.matcher.is_some()
    }
}

/// Map extracted key values onto the matcher's input fields.
fn key_fields_from(extraction: &ExtractionResult) -> KeyFields {
    KeyFields {
        cert_number: extraction.key_info.get(&FieldKind::CertNumber).cloned(),
        address: extraction.key_info.get(&FieldKind::Address).cloned(),
        house_number: extraction.key_info.get(&FieldKind::HouseNumber).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdoc_rules::RuleWeights;
    use std::collections::BTreeMap;

    fn deed_rules() -> RuleSet {
        RuleSet {
            patterns: BTreeMap::new(),
            rules: vec![DocTypeRule {
                type_name: "不动产权证书".into(),
                must_keywords: vec!["不动产权证书".into()],
                optional_keywords: vec!["权利人".into(), "坐落".into()],
                regex_checks: vec![],
                weights: RuleWeights {
                    must_keyword: 10.0,
                    optional_keyword: 5.0,
                    regex_hit: 3.0,
                },
                threshold: 10.0,
            }],
        }
    }

    fn classifier(dir: &tempfile::TempDir) -> HybridClassifier {
        let cfg = ClassifyConfig {
            samples_path: dir.path().join("samples.json"),
            model_path: dir.path().join("model.json"),
            ..ClassifyConfig::default()
        };
        HybridClassifier::with_rules(cfg, deed_rules())
    }

    fn deed_pages() -> Vec<CleanPage> {
        vec![CleanPage {
            page_index: 0,
            cleaned_text: "不动产权证书 证号: 京(2023)朝阳区不动产权第0012345号 \
权利人: 张三 坐落: 北京市朝阳区某某路100号1号楼5单元801"
                .into(),
            confidence: 0.97,
        }]
    }

    fn sample_registry() -> Registry {
        Registry::from_records(vec![PropertyRecord {
            property_id: "P001".into(),
            cert_number: Some("京(2023)朝阳区不动产权第0012345号".into()),
            address: Some("北京市朝阳区某某路100号1号楼5单元801".into()),
            house_number: Some("5-801".into()),
            extra: BTreeMap::new(),
        }])
    }

    #[test]
    fn full_pipeline_classifies_extracts_and_matches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let extractor = Extractor::new().expect("patterns compile");
        let matcher = FuzzyMatcher::with_registry(MatchConfig::default(), sample_registry())
            .expect("valid config");
        let mut pipeline = DocumentPipeline::new(extractor, classifier(&dir), Some(matcher));

        let report = pipeline
            .process_pages(&deed_pages())
            .expect("pipeline runs");

        assert_eq!(report.classification.classification.doc_type, "不动产权证书");
        assert_eq!(
            report.classification.classification.method,
            ClassifyMethod::Rules
        );
        assert!(report.extraction.key_info.contains_key(&FieldKind::CertNumber));

        let matched = report.match_result.expect("match ran");
        let auto = matched.auto_match.expect("auto match");
        assert_eq!(auto.property_id, "P001");
    }

    #[test]
    fn missing_registry_skips_matching() {
        let dir = tempfile::tempdir().expect("tempdir");
        let extractor = Extractor::new().expect("patterns compile");
        let mut pipeline = DocumentPipeline::new(extractor, classifier(&dir), None);

        let report = pipeline
            .process_pages(&deed_pages())
            .expect("pipeline runs");
        assert!(report.match_result.is_none());
    }

    #[test]
    fn verify_document_grows_sample_pool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let extractor = Extractor::new().expect("patterns compile");
        let mut pipeline = DocumentPipeline::new(extractor, classifier(&dir), None);

        let before = pipeline.classifier().sample_count();
        let result = pipeline.verify_document(&deed_pages(), "不动产权证书");
        assert_eq!(result.method, ClassifyMethod::Verified);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(pipeline.classifier().sample_count(), before + 1);
    }
}
