use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{Level, debug, info, warn};

use pdoc_rules::{RuleSet, UNKNOWN_DOC_TYPE};

use crate::error::{ClassifyError, TrainError};
use crate::model::TextModel;
use crate::rules::CompiledRules;
use crate::samples::{SamplePool, SampleStore};

/// How a classification decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyMethod {
    /// Operator-supplied label; recorded as a max-confidence sample.
    Verified,
    /// A rule cleared its threshold.
    Rules,
    /// Rules fell short; the learned model decided.
    Model,
    /// Neither rules nor model usable; reported as unknown.
    RulesFallback,
}

/// Result of classifying one text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub doc_type: String,
    pub confidence: f64,
    pub method: ClassifyMethod,
    /// Rule score per document type.
    pub rule_scores: BTreeMap<String, f64>,
    /// Model probability per class; empty when the model did not run.
    pub model_probabilities: BTreeMap<String, f64>,
    /// The best-scoring rule type when it did not clear its threshold —
    /// diagnostics only, never the public label.
    pub rule_candidate: Option<String>,
}

/// Per-page classification entry for page-type segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageClassification {
    pub page_index: usize,
    pub doc_type: String,
    pub confidence: f64,
    pub method: ClassifyMethod,
}

/// Whole-document classification: the decision over concatenated page text
/// plus a per-page breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentClassification {
    #[serde(flatten)]
    pub classification: Classification,
    pub page_types: Vec<PageClassification>,
}

/// Training mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainMode {
    /// Refit the feature transform and the classifier from scratch.
    Full,
    /// Keep the existing feature transform frozen; refit the classifier
    /// only. Falls back to a full retrain when no transform exists yet.
    Incremental,
}

/// Summary of a successful training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub mode: TrainMode,
    pub samples: usize,
    pub classes: Vec<String>,
    pub calibration_folds: usize,
}

/// Classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Rule YAML path. `None` or an unreadable file degrades to the
    /// fallback rule table rather than erroring.
    #[serde(default)]
    pub rules_path: Option<PathBuf>,

    #[serde(default = "ClassifyConfig::default_samples_path")]
    pub samples_path: PathBuf,

    #[serde(default = "ClassifyConfig::default_model_path")]
    pub model_path: PathBuf,

    /// Whether to load and consult the learned model at all.
    #[serde(default)]
    pub use_model: bool,

    /// Minimum confidence for a rules decision to enter the sample pool.
    #[serde(default = "ClassifyConfig::default_sample_score_threshold")]
    pub sample_score_threshold: f64,

    /// Minimum model confidence for a model decision to enter the pool.
    /// Usually stricter than `sample_score_threshold`.
    #[serde(default = "ClassifyConfig::default_model_confidence_threshold")]
    pub model_confidence_threshold: f64,

    /// Retrain automatically once enough verified samples accumulate.
    #[serde(default)]
    pub auto_train: bool,

    #[serde(default = "ClassifyConfig::default_min_samples")]
    pub min_samples_for_training: usize,

    /// Auto-training uses incremental mode when true, full otherwise.
    #[serde(default = "ClassifyConfig::default_true")]
    pub incremental_learning: bool,
}

impl ClassifyConfig {
    fn default_samples_path() -> PathBuf {
        PathBuf::from("data/samples.json")
    }

    fn default_model_path() -> PathBuf {
        PathBuf::from("data/model.json")
    }

    fn default_sample_score_threshold() -> f64 {
        0.8
    }

    fn default_model_confidence_threshold() -> f64 {
        0.9
    }

    fn default_min_samples() -> usize {
        10
    }

    fn default_true() -> bool {
        true
    }

    pub fn validate(&self) -> Result<(), ClassifyError> {
        let check = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ClassifyError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {v}"
                )))
            }
        };
        check("sample_score_threshold", self.sample_score_threshold)?;
        check(
            "model_confidence_threshold",
            self.model_confidence_threshold,
        )
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            samples_path: Self::default_samples_path(),
            model_path: Self::default_model_path(),
            use_model: false,
            sample_score_threshold: Self::default_sample_score_threshold(),
            model_confidence_threshold: Self::default_model_confidence_threshold(),
            auto_train: false,
            min_samples_for_training: Self::default_min_samples(),
            incremental_learning: Self::default_true(),
        }
    }
}

/// Rules-first, model-fallback document classifier with continual sample
/// collection.
///
/// The sample pool and model artifact are externally persisted and shared
/// across sessions; this struct owns one handle to each. Classification is
/// read-only with respect to the model — the only mutations are explicit
/// sample appends and `train_model`, so repeated calls on unchanged input
/// are idempotent in their decision output.
#[derive(Debug)]
pub struct HybridClassifier {
    cfg: ClassifyConfig,
    rules: CompiledRules,
    rules_available: bool,
    model: Option<TextModel>,
    store: SampleStore,
    pool: SamplePool,
}

impl HybridClassifier {
    /// Open a classifier, degrading on load failures instead of raising:
    /// unreadable rules become the fallback table, an unreadable model
    /// disables the model path. Both outcomes are visible through the
    /// capability accessors.
    pub fn open(cfg: ClassifyConfig) -> Self {
        let (rule_set, rules_available) = match &cfg.rules_path {
            Some(path) => match RuleSet::from_file(path) {
                Ok(set) => (set, true),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "rules_unavailable");
                    (RuleSet::fallback(), false)
                }
            },
            None => (RuleSet::fallback(), false),
        };
        Self::build(cfg, rule_set, rules_available)
    }

    /// Open with an already-loaded rule set (callers that parse their own
    /// configuration, and tests).
    pub fn with_rules(cfg: ClassifyConfig, rule_set: RuleSet) -> Self {
        Self::build(cfg, rule_set, true)
    }

    fn build(cfg: ClassifyConfig, rule_set: RuleSet, loaded: bool) -> Self {
        let (rules, rules_available) = match CompiledRules::compile(&rule_set) {
            Ok(rules) => (rules, loaded),
            Err(err) => {
                warn!(error = %err, "rules_compile_failed");
                (CompiledRules::fallback(), false)
            }
        };

        let model = if cfg.use_model {
            match TextModel::load(&cfg.model_path) {
                Ok(model) => Some(model),
                Err(err) => {
                    warn!(path = %cfg.model_path.display(), error = %err, "model_unavailable");
                    None
                }
            }
        } else {
            None
        };

        let store = SampleStore::new(&cfg.samples_path);
        let pool = store.load();
        Self {
            cfg,
            rules,
            rules_available,
            model,
            store,
            pool,
        }
    }

    /// Whether a real rule table (not the fallback) is in effect.
    pub fn rules_available(&self) -> bool {
        self.rules_available
    }

    /// Whether the learned-model path can run.
    pub fn model_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn sample_count(&self) -> usize {
        self.pool.count
    }

    /// Classify one text: rules first, model fallback, unknown otherwise.
    pub fn classify(&mut self, text: &str) -> Classification {
        let start = Instant::now();
        let span = tracing::span!(Level::INFO, "classify.document", len = text.len());
        let _guard = span.enter();

        let decision = self.rules.score(text);
        let rules_passed = self.rules_available && decision.passed;

        let result = if rules_passed {
            if decision.confidence >= self.cfg.sample_score_threshold {
                self.record_sample(text, &decision.candidate.clone(), decision.confidence, false);
            }
            Classification {
                doc_type: decision.candidate,
                confidence: decision.confidence,
                method: ClassifyMethod::Rules,
                rule_scores: decision.scores,
                model_probabilities: BTreeMap::new(),
                rule_candidate: None,
            }
        } else if let Some((label, confidence, probabilities)) =
            self.model.as_ref().and_then(|m| m.predict(text))
        {
            if confidence >= self.cfg.model_confidence_threshold {
                self.record_sample(text, &label, confidence, false);
            }
            Classification {
                doc_type: label,
                confidence,
                method: ClassifyMethod::Model,
                rule_scores: decision.scores,
                model_probabilities: probabilities,
                rule_candidate: Some(decision.candidate),
            }
        } else {
            Classification {
                doc_type: UNKNOWN_DOC_TYPE.to_string(),
                confidence: decision.confidence,
                method: ClassifyMethod::RulesFallback,
                rule_scores: decision.scores,
                model_probabilities: BTreeMap::new(),
                rule_candidate: Some(decision.candidate),
            }
        };

        let elapsed_micros = start.elapsed().as_micros();
        info!(
            doc_type = %result.doc_type,
            method = ?result.method,
            confidence = result.confidence,
            elapsed_micros,
            "classify_complete"
        );
        result
    }

    /// The supervised-labeling entry point: record the operator's label as
    /// a maximum-confidence sample unconditionally and skip scoring.
    pub fn classify_verified(&mut self, text: &str, label: &str) -> Classification {
        self.record_sample(text, label, 1.0, true);
        self.maybe_auto_train();
        Classification {
            doc_type: label.to_string(),
            confidence: 1.0,
            method: ClassifyMethod::Verified,
            rule_scores: BTreeMap::new(),
            model_probabilities: BTreeMap::new(),
            rule_candidate: None,
        }
    }

    /// Append a sample if the gate admits it: verified labels always pass,
    /// unverified ones need `confidence >= sample_score_threshold`. The
    /// pool is persisted immediately. Returns whether the pool grew.
    pub fn add_training_sample(
        &mut self,
        text: &str,
        label: &str,
        confidence: f64,
        verified: bool,
    ) -> Result<bool, ClassifyError> {
        if !verified && confidence < self.cfg.sample_score_threshold {
            return Ok(false);
        }
        self.store
            .append(&mut self.pool, text.to_string(), label.to_string())?;
        debug!(label, verified, count = self.pool.count, "sample_recorded");
        Ok(true)
    }

    fn record_sample(&mut self, text: &str, label: &str, confidence: f64, verified: bool) {
        if let Err(err) = self.add_training_sample(text, label, confidence, verified) {
            warn!(error = %err, label, "sample_persist_failed");
        }
    }

    fn maybe_auto_train(&mut self) {
        if !self.cfg.auto_train || self.pool.count < self.cfg.min_samples_for_training {
            return;
        }
        let mode = if self.cfg.incremental_learning {
            TrainMode::Incremental
        } else {
            TrainMode::Full
        };
        match self.train_model(mode) {
            Ok(report) => info!(samples = report.samples, mode = ?report.mode, "auto_train_complete"),
            Err(err) => warn!(error = %err, "auto_train_failed"),
        }
    }

    /// Train (or retrain) the model from the accumulated pool and persist
    /// it atomically. Failure leaves the previous model — in memory and on
    /// disk — authoritative.
    pub fn train_model(&mut self, mode: TrainMode) -> Result<TrainReport, TrainError> {
        if self.pool.count < 2 {
            return Err(TrainError::NotEnoughSamples {
                count: self.pool.count,
            });
        }

        let model = match mode {
            TrainMode::Full => TextModel::train_full(&self.pool)?,
            TrainMode::Incremental => match &self.model {
                Some(existing) => {
                    TextModel::train_incremental(existing.vectorizer.clone(), &self.pool)?
                }
                None => {
                    debug!("no feature transform to reuse; running full retrain");
                    TextModel::train_full(&self.pool)?
                }
            },
        };

        model
            .save_atomic(&self.cfg.model_path)
            .map_err(TrainError::Persist)?;

        let report = TrainReport {
            mode,
            samples: model.sample_count,
            classes: model.classifier.classes.clone(),
            calibration_folds: model.classifier.calibration_folds,
        };
        self.model = Some(model);
        info!(
            samples = report.samples,
            classes = report.classes.len(),
            folds = report.calibration_folds,
            mode = ?report.mode,
            "train_complete"
        );
        Ok(report)
    }

    /// Classify the whole document over concatenated page text, plus each
    /// page individually for page-type segmentation.
    pub fn classify_pages(&mut self, pages: &[&str]) -> DocumentClassification {
        let all_text = pages.join(" ");
        let classification = self.classify(&all_text);
        let page_types = pages
            .iter()
            .enumerate()
            .map(|(page_index, page_text)| {
                let page = self.classify(page_text);
                PageClassification {
                    page_index,
                    doc_type: page.doc_type,
                    confidence: page.confidence,
                    method: page.method,
                }
            })
            .collect();
        DocumentClassification {
            classification,
            page_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdoc_rules::{DocTypeRule, RuleWeights};

    fn deed_rules() -> RuleSet {
        RuleSet {
            patterns: BTreeMap::new(),
            rules: vec![DocTypeRule {
                type_name: "deed".into(),
                must_keywords: vec!["不动产权证书".into()],
                optional_keywords: vec!["权利人".into()],
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

    fn test_config(dir: &tempfile::TempDir) -> ClassifyConfig {
        ClassifyConfig {
            samples_path: dir.path().join("samples.json"),
            model_path: dir.path().join("model.json"),
            ..ClassifyConfig::default()
        }
    }

    #[test]
    fn rule_hit_classifies_with_full_confidence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut classifier = HybridClassifier::with_rules(test_config(&dir), deed_rules());

        let result = classifier.classify("不动产权证书 证号: 京(2023)朝阳区不动产权第0012345号");
        assert_eq!(result.doc_type, "deed");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.method, ClassifyMethod::Rules);
        assert!(result.rule_candidate.is_none());
        // confidence 1.0 >= sample threshold, so the decision was recorded
        assert_eq!(classifier.sample_count(), 1);
    }

    #[test]
    fn below_threshold_reports_unknown_with_partial_confidence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut rules = deed_rules();
        rules.rules[0].must_keywords.clear();
        let mut classifier = HybridClassifier::with_rules(test_config(&dir), rules);

        // one optional keyword: 5 of 10
        let result = classifier.classify("权利人: 张三");
        assert_eq!(result.doc_type, UNKNOWN_DOC_TYPE);
        assert!((result.confidence - 0.5).abs() < 1e-9);
        assert_eq!(result.method, ClassifyMethod::RulesFallback);
        assert_eq!(result.rule_candidate.as_deref(), Some("deed"));
        assert_eq!(classifier.sample_count(), 0);
    }

    #[test]
    fn verified_label_recorded_regardless_of_scores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut classifier = HybridClassifier::with_rules(test_config(&dir), deed_rules());

        let result = classifier.classify_verified("完全无关的文本", "contract");
        assert_eq!(result.doc_type, "contract");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.method, ClassifyMethod::Verified);
        assert_eq!(classifier.sample_count(), 1);

        // the pool survives reopening the classifier
        let reopened = HybridClassifier::with_rules(test_config(&dir), deed_rules());
        assert_eq!(reopened.sample_count(), 1);
    }

    #[test]
    fn training_with_one_sample_fails_without_side_effects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut classifier = HybridClassifier::with_rules(test_config(&dir), deed_rules());
        classifier.classify_verified("不动产权证书", "deed");

        let err = classifier
            .train_model(TrainMode::Full)
            .expect_err("one sample must not train");
        assert!(matches!(err, TrainError::NotEnoughSamples { count: 1 }));
        assert!(!classifier.model_available());
        assert!(!dir.path().join("model.json").exists());
    }

    #[test]
    fn trained_model_takes_over_when_rules_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = test_config(&dir);
        cfg.use_model = true;
        let mut classifier = HybridClassifier::with_rules(cfg, deed_rules());

        classifier.classify_verified("商品房买卖合同 出卖人 买受人 价款", "contract");
        classifier.classify_verified("买卖合同 合同编号 付款方式 交房", "contract");
        classifier.classify_verified("不动产权证书 权利人 坐落", "deed");
        classifier.classify_verified("不动产权证书 权利类型 用途", "deed");
        classifier
            .train_model(TrainMode::Full)
            .expect("training succeeds");

        // no must keyword for the deed rule, so rules miss and the model runs
        let result = classifier.classify("买卖合同 价款 付款方式");
        assert_eq!(result.method, ClassifyMethod::Model);
        assert_eq!(result.doc_type, "contract");
        assert!(!result.model_probabilities.is_empty());
        assert_eq!(result.rule_candidate.as_deref(), Some("deed"));
    }

    #[test]
    fn classification_is_idempotent_between_training_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut classifier = HybridClassifier::with_rules(test_config(&dir), deed_rules());

        let text = "不动产权证书 权利人";
        let first = classifier.classify(text);
        let second = classifier.classify(text);
        assert_eq!(first.doc_type, second.doc_type);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.method, second.method);
    }

    #[test]
    fn missing_rules_file_degrades_to_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = test_config(&dir);
        cfg.rules_path = Some(dir.path().join("missing-rules.yaml"));
        let mut classifier = HybridClassifier::open(cfg);

        assert!(!classifier.rules_available());
        let result = classifier.classify("不动产权证书");
        assert_eq!(result.doc_type, UNKNOWN_DOC_TYPE);
        assert_eq!(result.method, ClassifyMethod::RulesFallback);
    }

    #[test]
    fn missing_model_file_disables_model_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = test_config(&dir);
        cfg.use_model = true;
        let classifier = HybridClassifier::with_rules(cfg, deed_rules());
        assert!(!classifier.model_available());
    }

    #[test]
    fn failed_retrain_leaves_previous_model_active() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = test_config(&dir);
        cfg.use_model = true;
        let mut classifier = HybridClassifier::with_rules(cfg.clone(), deed_rules());

        classifier.classify_verified("不动产权证书 权利人", "deed");
        classifier.classify_verified("买卖合同 价款", "contract");
        classifier
            .train_model(TrainMode::Full)
            .expect("training succeeds");

        // make the model path unwritable by turning it into a directory
        std::fs::remove_file(&cfg.model_path).expect("remove model");
        std::fs::create_dir(&cfg.model_path).expect("block model path");

        classifier.classify_verified("租赁合同 租金", "lease");
        let err = classifier
            .train_model(TrainMode::Full)
            .expect_err("persist must fail");
        assert!(matches!(err, TrainError::Persist(_)));

        // the in-memory model is still the last successfully trained one
        assert!(classifier.model_available());
        let result = classifier.classify("买卖合同 价款 付款");
        assert!(!result.model_probabilities.contains_key("lease"));
    }

    #[test]
    fn page_classification_covers_each_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut classifier = HybridClassifier::with_rules(test_config(&dir), deed_rules());

        let doc = classifier.classify_pages(&["不动产权证书 权利人", "无关内容"]);
        assert_eq!(doc.classification.doc_type, "deed");
        assert_eq!(doc.page_types.len(), 2);
        assert_eq!(doc.page_types[0].doc_type, "deed");
        assert_eq!(doc.page_types[1].doc_type, UNKNOWN_DOC_TYPE);
    }
}
