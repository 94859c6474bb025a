//! propdoc hybrid classification.
//!
//! Rules first: every [`pdoc_rules::DocTypeRule`] is scored against the
//! text, and a type that clears its threshold wins. When rules fall short,
//! a learned text model (tf-idf features + centroid classifier) takes over,
//! and when neither path is usable the document is reported as `unknown`
//! with the rule confidence attached.
//!
//! Classification also feeds itself: confident decisions and
//! operator-verified labels are appended to an externally persisted sample
//! pool, from which [`HybridClassifier::train_model`] rebuilds the model —
//! fully, or incrementally against a frozen feature transform.
//!
//! Load failures never raise. Missing rules degrade to a fallback table,
//! a missing model disables the model path; both are observable through
//! capability accessors on the classifier.

mod classifier;
mod error;
mod model;
mod rules;
mod samples;

pub use crate::classifier::{
    Classification, ClassifyConfig, ClassifyMethod, DocumentClassification, HybridClassifier,
    PageClassification, TrainMode, TrainReport,
};
pub use crate::error::{ClassifyError, TrainError};
pub use crate::model::{CentroidClassifier, TextModel, TfIdfVectorizer, calibration_folds};
pub use crate::rules::{CompiledRules, RuleDecision};
pub use crate::samples::{SamplePool, SampleStore};
