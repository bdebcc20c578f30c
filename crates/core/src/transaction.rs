use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::category::Category;
use super::money::Money;

pub const DEFAULT_CURRENCY: &str = "IDR";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// `t_` followed by a full 128-bit random UUID in simple hex form.
    pub fn generate() -> Self {
        TransactionId(format!("t_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSource {
    pub file: String,
}

/// Provenance of an extracted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedWith {
    pub model: String,
    pub schema_version: String,
}

/// A persisted transaction. Never modified after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    pub description_raw: String,
    pub amount: Money,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub merchant_canonical: String,
    pub category: Category,
    pub category_confidence: f64,
    /// Reserved; always `false` at creation.
    #[serde(default)]
    pub is_recurring: bool,
    /// Reserved; always `None` at creation.
    #[serde(default)]
    pub recurring_frequency: Option<String>,
    pub source: TransactionSource,
    pub extracted_with: ExtractedWith,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// One transaction as returned by the upstream extractor, before validation
/// and fallback classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTransaction {
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub merchant_canonical: String,
    pub category: String,
    pub confidence: f64,
}
