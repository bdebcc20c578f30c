pub mod rules;

pub use rules::{
    classify, Decision, FallbackClassifier, KeywordRule, CONFIDENCE_THRESHOLD, FALLBACK_RULES,
};
