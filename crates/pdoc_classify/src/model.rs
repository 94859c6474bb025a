use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClassifyError, TrainError};
use crate::samples::SamplePool;

/// Number of calibration folds the training bookkeeping records:
/// `min(3, distinct_label_count)`.
pub fn calibration_folds(distinct_labels: usize) -> usize {
    distinct_labels.min(3)
}

/// TF-IDF feature transform over tokenized text.
///
/// ASCII alphanumeric runs become lowercase word tokens; Han runs become
/// overlapping character bigrams, which is the usual segmentation-free
/// fallback for unsegmented Chinese.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    n_documents: usize,
}

impl TfIdfVectorizer {
    /// Fit vocabulary and inverse document frequencies on a corpus.
    pub fn fit(&mut self, documents: &[String]) {
        let mut vocabulary: BTreeMap<String, usize> = BTreeMap::new();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let unique: BTreeSet<String> = tokenize(doc).into_iter().collect();
            for token in unique {
                *document_frequency.entry(token.clone()).or_insert(0) += 1;
                let next = vocabulary.len();
                vocabulary.entry(token).or_insert(next);
            }
        }

        let mut idf = vec![0.0; vocabulary.len()];
        let n = documents.len() as f64;
        for (token, idx) in &vocabulary {
            let df = *document_frequency.get(token).unwrap_or(&0) as f64;
            // idf = ln((N + 1) / (df + 1)) + 1
            idf[*idx] = ((n + 1.0) / (df + 1.0)).ln() + 1.0;
        }

        self.vocabulary = vocabulary;
        self.idf = idf;
        self.n_documents = documents.len();
    }

    /// Transform one document into a length-normalized tf-idf vector.
    /// Out-of-vocabulary tokens are silently dropped.
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let tokens = tokenize(document);
        let mut tf = vec![0.0; self.vocabulary.len()];
        for token in &tokens {
            if let Some(&idx) = self.vocabulary.get(token) {
                tf[idx] += 1.0;
            }
        }
        let doc_length = tokens.len() as f64;
        if doc_length > 0.0 {
            for value in &mut tf {
                *value /= doc_length;
            }
        }
        for (idx, value) in tf.iter_mut().enumerate() {
            *value *= self.idf[idx];
        }
        tf
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Word tokens for ASCII alphanumeric runs, character bigrams for Han runs.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut ascii_run = String::new();
    let mut han_run: Vec<char> = Vec::new();

    let flush_ascii = |run: &mut String, tokens: &mut Vec<String>| {
        if !run.is_empty() {
            tokens.push(run.to_lowercase());
            run.clear();
        }
    };
    let flush_han = |run: &mut Vec<char>, tokens: &mut Vec<String>| {
        match run.len() {
            0 => {}
            1 => tokens.push(run[0].to_string()),
            _ => {
                for pair in run.windows(2) {
                    tokens.push(pair.iter().collect());
                }
            }
        }
        run.clear();
    };

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            flush_han(&mut han_run, &mut tokens);
            ascii_run.push(c);
        } else if ('\u{4e00}'..='\u{9fff}').contains(&c) {
            flush_ascii(&mut ascii_run, &mut tokens);
            han_run.push(c);
        } else {
            flush_ascii(&mut ascii_run, &mut tokens);
            flush_han(&mut han_run, &mut tokens);
        }
    }
    flush_ascii(&mut ascii_run, &mut tokens);
    flush_han(&mut han_run, &mut tokens);
    tokens
}

/// Nearest-centroid classifier with a normalized probability output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidClassifier {
    pub classes: Vec<String>,
    centroids: Vec<Vec<f64>>,
    /// Training bookkeeping: `min(3, distinct_label_count)` at fit time.
    pub calibration_folds: usize,
}

impl CentroidClassifier {
    /// Fit one centroid per class from already-transformed features.
    pub fn fit(features: &[Vec<f64>], labels: &[String]) -> Result<Self, TrainError> {
        let dims = features.first().map(Vec::len).unwrap_or(0);
        if dims == 0 {
            return Err(TrainError::EmptyVocabulary);
        }

        let mut grouped: BTreeMap<&str, (Vec<f64>, usize)> = BTreeMap::new();
        for (feature, label) in features.iter().zip(labels) {
            let entry = grouped
                .entry(label.as_str())
                .or_insert_with(|| (vec![0.0; dims], 0));
            for (acc, v) in entry.0.iter_mut().zip(feature) {
                *acc += v;
            }
            entry.1 += 1;
        }

        let mut classes = Vec::with_capacity(grouped.len());
        let mut centroids = Vec::with_capacity(grouped.len());
        for (label, (mut sum, count)) in grouped {
            for v in &mut sum {
                *v /= count as f64;
            }
            classes.push(label.to_string());
            centroids.push(sum);
        }

        let folds = calibration_folds(classes.len());
        Ok(Self {
            classes,
            centroids,
            calibration_folds: folds,
        })
    }

    /// Per-class probabilities: non-negative cosine scores against each
    /// centroid, normalized to sum to 1. A feature vector orthogonal to
    /// every centroid yields a uniform distribution.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut scores: Vec<f64> = self
            .centroids
            .iter()
            .map(|centroid| cosine_similarity(features, centroid).max(0.0))
            .collect();
        let total: f64 = scores.iter().sum();
        if total > 0.0 {
            for s in &mut scores {
                *s /= total;
            }
        } else {
            let uniform = 1.0 / self.classes.len().max(1) as f64;
            scores.iter_mut().for_each(|s| *s = uniform);
        }
        scores
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// The persisted model artifact: feature transform plus classifier.
/// Replaced wholesale on retrain; never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextModel {
    pub vectorizer: TfIdfVectorizer,
    pub classifier: CentroidClassifier,
    pub trained_at: DateTime<Utc>,
    pub sample_count: usize,
}

impl TextModel {
    /// Full retrain: refit the feature transform, then the classifier.
    pub fn train_full(pool: &SamplePool) -> Result<Self, TrainError> {
        if pool.count < 2 {
            return Err(TrainError::NotEnoughSamples { count: pool.count });
        }
        let mut vectorizer = TfIdfVectorizer::default();
        vectorizer.fit(&pool.texts);
        Self::fit_classifier(vectorizer, pool)
    }

    /// Incremental retrain: reuse an existing (frozen) feature transform and
    /// refit only the classifier on the grown sample set. The vocabulary is
    /// NOT updated — tokens unseen at the last full fit stay invisible.
    pub fn train_incremental(
        vectorizer: TfIdfVectorizer,
        pool: &SamplePool,
    ) -> Result<Self, TrainError> {
        if pool.count < 2 {
            return Err(TrainError::NotEnoughSamples { count: pool.count });
        }
        Self::fit_classifier(vectorizer, pool)
    }

    fn fit_classifier(vectorizer: TfIdfVectorizer, pool: &SamplePool) -> Result<Self, TrainError> {
        let features: Vec<Vec<f64>> = pool.texts.iter().map(|t| vectorizer.transform(t)).collect();
        let classifier = CentroidClassifier::fit(&features, &pool.labels)?;
        debug!(
            classes = classifier.classes.len(),
            vocabulary = vectorizer.vocabulary_size(),
            samples = pool.count,
            "model_fitted"
        );
        Ok(Self {
            vectorizer,
            classifier,
            trained_at: Utc::now(),
            sample_count: pool.count,
        })
    }

    /// Arg-max class, its probability, and the full probability map.
    pub fn predict(&self, text: &str) -> Option<(String, f64, BTreeMap<String, f64>)> {
        if self.classifier.classes.is_empty() {
            return None;
        }
        let features = self.vectorizer.transform(text);
        let probs = self.classifier.predict_proba(&features);
        let mut probabilities = BTreeMap::new();
        let mut best = 0;
        for (idx, (class, p)) in self.classifier.classes.iter().zip(&probs).enumerate() {
            probabilities.insert(class.clone(), *p);
            if *p > probs[best] {
                best = idx;
            }
        }
        Some((
            self.classifier.classes[best].clone(),
            probs[best],
            probabilities,
        ))
    }

    /// Load a model artifact from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifyError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ClassifyError::Io {
            what: format!("model file {}", path.display()),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ClassifyError::Decode {
            what: format!("model file {}", path.display()),
            source,
        })
    }

    /// Persist atomically: serialize to a sibling temp file, then rename
    /// over the target. Readers see the old artifact or the new one, never
    /// a partial write.
    pub fn save_atomic<P: AsRef<Path>>(&self, path: P) -> Result<(), ClassifyError> {
        let path = path.as_ref();
        let json = serde_json::to_string(self).map_err(|source| ClassifyError::Decode {
            what: format!("model file {}", path.display()),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| ClassifyError::Io {
            what: format!("model file {}", path.display()),
            source,
        };
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(samples: &[(&str, &str)]) -> SamplePool {
        let mut pool = SamplePool::default();
        for (text, label) in samples {
            pool.append(text.to_string(), label.to_string());
        }
        pool
    }

    fn training_pool() -> SamplePool {
        pool(&[
            ("不动产权证书 证号 权利人 坐落", "deed"),
            ("不动产权证书 权利类型 权利性质", "deed"),
            ("商品房买卖合同 出卖人 买受人 价款", "contract"),
            ("买卖合同 合同编号 付款方式", "contract"),
        ])
    }

    #[test]
    fn tokenizer_emits_han_bigrams_and_ascii_words() {
        let tokens = tokenize("合同HT2023号");
        assert!(tokens.contains(&"合同".to_string()));
        assert!(tokens.contains(&"ht2023".to_string()));
    }

    #[test]
    fn vectorizer_dimensions_match_vocabulary() {
        let mut v = TfIdfVectorizer::default();
        v.fit(&["不动产权证书".to_string(), "买卖合同".to_string()]);
        assert!(v.vocabulary_size() > 0);
        assert_eq!(v.transform("不动产权").len(), v.vocabulary_size());
    }

    #[test]
    fn full_training_predicts_seen_classes() {
        let model = TextModel::train_full(&training_pool()).expect("training succeeds");
        let (label, confidence, probs) =
            model.predict("不动产权证书 坐落").expect("prediction");
        assert_eq!(label, "deed");
        assert!(confidence > 0.5);
        assert!((probs.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn training_rejects_single_sample() {
        let single = pool(&[("不动产权证书", "deed")]);
        let err = TextModel::train_full(&single).expect_err("must fail");
        assert!(matches!(err, TrainError::NotEnoughSamples { count: 1 }));
    }

    #[test]
    fn incremental_training_keeps_vocabulary_frozen() {
        let model = TextModel::train_full(&training_pool()).expect("training succeeds");
        let vocab = model.vectorizer.vocabulary_size();

        let mut grown = training_pool();
        grown.append("完全崭新的词汇表漂移样本".to_string(), "other".to_string());
        let retrained =
            TextModel::train_incremental(model.vectorizer.clone(), &grown).expect("retrain");

        assert_eq!(retrained.vectorizer.vocabulary_size(), vocab);
        assert!(retrained.classifier.classes.contains(&"other".to_string()));
    }

    #[test]
    fn calibration_folds_capped_at_three() {
        assert_eq!(calibration_folds(2), 2);
        assert_eq!(calibration_folds(3), 3);
        assert_eq!(calibration_folds(7), 3);
        let model = TextModel::train_full(&training_pool()).expect("training succeeds");
        assert_eq!(model.classifier.calibration_folds, 2);
    }

    #[test]
    fn artifact_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.json");
        let model = TextModel::train_full(&training_pool()).expect("training succeeds");
        model.save_atomic(&path).expect("save");
        let loaded = TextModel::load(&path).expect("load");
        assert_eq!(loaded.classifier.classes, model.classifier.classes);
        assert_eq!(loaded.sample_count, model.sample_count);
    }

    #[test]
    fn unseen_tokens_yield_uniform_probabilities() {
        let model = TextModel::train_full(&training_pool()).expect("training succeeds");
        let (_, confidence, probs) = model.predict("zzz").expect("prediction");
        assert_eq!(probs.len(), 2);
        assert!((confidence - 0.5).abs() < 1e-9);
    }
}
