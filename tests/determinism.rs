use std::collections::BTreeMap;

use propdoc::{
    ClassifyConfig, DocTypeRule, Extractor, FieldKind, FuzzyMatcher, HybridClassifier, KeyFields,
    MatchConfig, PropertyRecord, Registry, RuleSet, RuleWeights,
};

const DEED_TEXT: &str = "不动产权证书 证号: 京(2023)朝阳区不动产权第0012345号 \
权利人: 张三 坐落: 北京市朝阳区某某路100号1号楼5单元801 签发日期: 2023年06月15日";

fn deed_rules() -> RuleSet {
    RuleSet {
        patterns: BTreeMap::new(),
        rules: vec![DocTypeRule {
            type_name: "不动产权证书".into(),
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

#[test]
fn repeated_classification_is_identical_without_training() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = ClassifyConfig {
        samples_path: dir.path().join("samples.json"),
        model_path: dir.path().join("model.json"),
        ..ClassifyConfig::default()
    };
    let mut classifier = HybridClassifier::with_rules(cfg, deed_rules());

    let first = classifier.classify(DEED_TEXT);
    for _ in 0..5 {
        let next = classifier.classify(DEED_TEXT);
        assert_eq!(next.doc_type, first.doc_type);
        assert_eq!(next.confidence, first.confidence);
        assert_eq!(next.method, first.method);
        assert_eq!(next.rule_scores, first.rule_scores);
    }
}

#[test]
fn repeated_extraction_is_identical() {
    let extractor = Extractor::new().expect("patterns compile");
    let first = extractor.extract_all(DEED_TEXT);
    for _ in 0..5 {
        assert_eq!(extractor.extract_all(DEED_TEXT), first);
    }
}

#[test]
fn single_candidate_selection_returns_value_unchanged() {
    let extractor = Extractor::new().expect("patterns compile");
    let candidates = extractor.extract_field(DEED_TEXT, FieldKind::CertNumber);
    assert_eq!(candidates.len(), 1);
    let best = extractor
        .select_best(FieldKind::CertNumber, &candidates)
        .expect("candidate present");
    assert_eq!(best.candidate.value, candidates[0].value);
}

#[test]
fn merged_matches_never_repeat_a_property_id() {
    let registry = Registry::from_records(vec![
        PropertyRecord {
            property_id: "P001".into(),
            cert_number: Some("京(2023)朝阳区不动产权第0012345号".into()),
            address: Some("北京市朝阳区某某路100号1号楼5单元801".into()),
            house_number: Some("5-801".into()),
            extra: BTreeMap::new(),
        },
        PropertyRecord {
            property_id: "P002".into(),
            cert_number: Some("京(2023)朝阳区不动产权第0012399号".into()),
            address: Some("北京市朝阳区某某路100号1号楼5单元802".into()),
            house_number: Some("5-802".into()),
            extra: BTreeMap::new(),
        },
    ]);
    let matcher =
        FuzzyMatcher::with_registry(MatchConfig::default(), registry).expect("valid config");

    let key_fields = KeyFields {
        cert_number: Some("京(2023)朝阳区不动产权第0012345号".into()),
        address: Some("北京市朝阳区某某路100号1号楼5单元801".into()),
        house_number: Some("5-801".into()),
    };

    for _ in 0..3 {
        let outcome = matcher.match_document(&key_fields).expect("match runs");
        let mut ids: Vec<&str> = outcome
            .all_matches
            .iter()
            .map(|m| m.property_id.as_str())
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);

        // the kept P001 entry carries its maximum single-field similarity
        let best = outcome.best_match.expect("best match");
        assert_eq!(best.property_id, "P001");
        assert_eq!(best.similarity, 1.0);
    }
}
