use std::fs;

use propdoc::{
    ClassifyConfig, ClassifyMethod, ConfigLoadError, DocumentPipeline, FuzzyMatcher,
    HybridClassifier, KeyFields, MatchConfig, MatchError, MatchField, PropdocConfig, TrainError,
    TrainMode, UNKNOWN_DOC_TYPE,
};

#[test]
fn matching_without_registry_is_a_usage_error() {
    let matcher = FuzzyMatcher::new(MatchConfig::default()).expect("valid config");

    let err = matcher
        .match_by_field(MatchField::Address, "北京市朝阳区某某路100号")
        .expect_err("registry missing");
    assert!(matches!(err, MatchError::RegistryNotLoaded));

    let err = matcher
        .match_document(&KeyFields::default())
        .expect_err("registry missing");
    assert!(matches!(err, MatchError::RegistryNotLoaded));
}

#[test]
fn training_below_two_samples_fails_and_touches_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = ClassifyConfig {
        samples_path: dir.path().join("samples.json"),
        model_path: dir.path().join("model.json"),
        ..ClassifyConfig::default()
    };
    let mut classifier = HybridClassifier::open(cfg.clone());

    let err = classifier
        .train_model(TrainMode::Full)
        .expect_err("zero samples");
    assert!(matches!(err, TrainError::NotEnoughSamples { count: 0 }));

    classifier.classify_verified("不动产权证书", "不动产权证书");
    let err = classifier
        .train_model(TrainMode::Incremental)
        .expect_err("one sample");
    assert!(matches!(err, TrainError::NotEnoughSamples { count: 1 }));

    assert!(!cfg.model_path.exists());
    assert!(!classifier.model_available());
}

#[test]
fn missing_rules_degrade_instead_of_raising() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = ClassifyConfig {
        rules_path: Some(dir.path().join("does-not-exist.yaml")),
        samples_path: dir.path().join("samples.json"),
        model_path: dir.path().join("model.json"),
        ..ClassifyConfig::default()
    };
    let mut classifier = HybridClassifier::open(cfg);

    assert!(!classifier.rules_available());
    let result = classifier.classify("不动产权证书 权利人");
    assert_eq!(result.doc_type, UNKNOWN_DOC_TYPE);
    assert_eq!(result.method, ClassifyMethod::RulesFallback);
}

#[test]
fn corrupt_model_artifact_disables_model_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_path = dir.path().join("model.json");
    fs::write(&model_path, "{definitely not a model").expect("write corrupt model");

    let cfg = ClassifyConfig {
        samples_path: dir.path().join("samples.json"),
        model_path,
        use_model: true,
        ..ClassifyConfig::default()
    };
    let classifier = HybridClassifier::open(cfg);
    assert!(!classifier.model_available());
}

#[test]
fn corrupt_sample_pool_degrades_to_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let samples_path = dir.path().join("samples.json");
    fs::write(&samples_path, "[[[").expect("write corrupt pool");

    let cfg = ClassifyConfig {
        samples_path,
        model_path: dir.path().join("model.json"),
        ..ClassifyConfig::default()
    };
    let classifier = HybridClassifier::open(cfg);
    assert_eq!(classifier.sample_count(), 0);
}

#[test]
fn configured_but_unreadable_registry_fails_pipeline_build() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = PropdocConfig::default();
    config.classify.samples_path = dir.path().join("samples.json");
    config.classify.model_path = dir.path().join("model.json");
    config.matcher.registry_path = Some(dir.path().join("missing-registry.csv"));

    let err = DocumentPipeline::from_config(&config).expect_err("registry was requested");
    assert!(matches!(
        err,
        propdoc::PipelineError::Match(MatchError::RegistryRead { .. })
    ));
}

#[test]
fn config_version_and_threshold_validation() {
    let err = PropdocConfig::from_yaml("version: \"9\"").expect_err("bad version");
    assert!(matches!(err, ConfigLoadError::UnsupportedVersion(_)));

    let yaml = "version: \"1.0\"\nclassify:\n  sample_score_threshold: 2.0\n";
    let err = PropdocConfig::from_yaml(yaml).expect_err("bad threshold");
    assert!(matches!(err, ConfigLoadError::Validation(_)));
}

#[test]
fn registry_without_property_id_column_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("registry.csv");
    fs::write(&path, "cert_number,address\nabc,def\n").expect("write csv");

    let err = propdoc::Registry::from_csv_path(&path).expect_err("must reject");
    assert!(matches!(err, MatchError::MissingPropertyId { .. }));
}
