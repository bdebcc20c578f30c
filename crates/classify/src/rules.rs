use std::str::FromStr;

use dompet_core::{CandidateTransaction, Category};

/// At or above this upstream confidence the extractor's own category is kept.
pub const CONFIDENCE_THRESHOLD: f64 = 0.6;

/// A category together with the lower-case keywords that select it.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub category: Category,
    pub keywords: &'static [&'static str],
}

/// Keyword rules in priority order. The first rule with any hit wins.
pub const FALLBACK_RULES: &[KeywordRule] = &[
    KeywordRule {
        category: Category::Income,
        keywords: &["salary", "gaji", "transfer masuk", "refund", "cashback", "interest"],
    },
    KeywordRule {
        category: Category::FoodDining,
        keywords: &[
            "restaurant",
            "cafe",
            "starbucks",
            "mcdonald",
            "kfc",
            "pizza",
            "food",
            "gofood",
            "grabfood",
            "supermarket",
        ],
    },
    KeywordRule {
        category: Category::TransportMobility,
        keywords: &[
            "fuel", "bensin", "pertamina", "shell", "gojek", "grab", "taxi", "parking", "toll",
            "tol",
        ],
    },
    KeywordRule {
        category: Category::BillsUtilities,
        keywords: &[
            "pln",
            "listrik",
            "telkom",
            "indihome",
            "insurance",
            "asuransi",
            "water",
            "air",
            "phone",
            "telp",
        ],
    },
    KeywordRule {
        category: Category::ShoppingEntertainment,
        keywords: &[
            "shop",
            "mall",
            "store",
            "tokopedia",
            "shopee",
            "lazada",
            "netflix",
            "spotify",
            "subscription",
        ],
    },
];

/// How a category was chosen for a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Upstream category trusted as-is.
    Upstream(Category),
    /// Low confidence (or an unrecognised upstream category); a keyword matched.
    Keyword {
        category: Category,
        keyword: &'static str,
    },
    /// Low confidence and nothing matched.
    NoMatch,
}

impl Decision {
    pub fn category(self) -> Category {
        match self {
            Decision::Upstream(c) => c,
            Decision::Keyword { category, .. } => category,
            Decision::NoMatch => Category::Other,
        }
    }
}

pub struct FallbackClassifier {
    rules: &'static [KeywordRule],
    threshold: f64,
}

impl Default for FallbackClassifier {
    fn default() -> Self {
        Self {
            rules: FALLBACK_RULES,
            threshold: CONFIDENCE_THRESHOLD,
        }
    }
}

impl FallbackClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &'static [KeywordRule] {
        self.rules
    }

    /// Total and pure: every input yields exactly one taxonomy value.
    pub fn classify(&self, candidate: &CandidateTransaction) -> Category {
        self.explain(candidate).category()
    }

    pub fn explain(&self, candidate: &CandidateTransaction) -> Decision {
        // NaN compares false, so it falls through to the keyword rules.
        if candidate.confidence >= self.threshold {
            if let Ok(category) = Category::from_str(&candidate.category) {
                return Decision::Upstream(category);
            }
        }

        let description = candidate.description.to_lowercase();
        let merchant = candidate.merchant_canonical.to_lowercase();

        self.rules
            .iter()
            .find_map(|rule| {
                rule.keywords
                    .iter()
                    .copied()
                    .find(|kw| description.contains(kw) || merchant.contains(kw))
                    .map(|kw| Decision::Keyword {
                        category: rule.category,
                        keyword: kw,
                    })
            })
            .unwrap_or(Decision::NoMatch)
    }
}

/// Classifies with the built-in rule table.
pub fn classify(candidate: &CandidateTransaction) -> Category {
    FallbackClassifier::default().classify(candidate)
}
