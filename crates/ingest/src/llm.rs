use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dompet_core::{CandidateTransaction, Category};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

const SYSTEM_PROMPT: &str = "You are an expert at extracting financial transactions from bank statement PDFs.

Extract ALL transactions from the document, ensuring:
1. Date format: YYYY-MM-DD
2. Amount: negative for expenses/outgoing, positive for income/incoming
3. Description: exact text from statement
4. Merchant canonical: standardized merchant name (e.g., \"STARBUCKS KOTA KASABLANKA\" -> \"Starbucks\")
5. Category: classify into one of the 6 predefined categories
6. Confidence: your confidence in the categorization (0.0-1.0)

Categories:
- Income: salary, transfers in, refunds, cashback
- Food & Dining: restaurants, cafes, food delivery, groceries
- Transport & Mobility: fuel, parking, ride-sharing, public transport
- Bills & Utilities: electricity, water, phone, internet, insurance
- Shopping & Entertainment: retail, online shopping, movies, subscriptions
- Other: everything else, ATM withdrawals, bank fees

Be thorough and extract every single transaction visible in the document.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OpenAI API key is not configured")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Completion contained no message content")]
    EmptyResponse,
    #[error("Malformed extraction payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Extractor rejected input: {0}")]
    Rejected(String),
}

/// Turns statement text into candidate transactions.
pub trait TransactionExtractor: Send + Sync {
    fn extract(
        &self,
        text: &str,
        source_filename: &str,
    ) -> impl Future<Output = Result<Vec<CandidateTransaction>, LlmError>> + Send;
}

// ── OpenAI Chat Completions backend ───────────────────────────────────────────

pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chat Completions request with a strict JSON-schema response format.
    pub fn request_body(&self, text: &str, source_filename: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "Please extract all transactions from this bank statement text from file '{source_filename}':\n\n{text}"
                    ),
                },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "transaction_extraction",
                    "strict": true,
                    "schema": extraction_schema(),
                },
            },
        })
    }
}

impl TransactionExtractor for OpenAiExtractor {
    async fn extract(
        &self,
        text: &str,
        source_filename: &str,
    ) -> Result<Vec<CandidateTransaction>, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!(file = source_filename, chars = text.len(), model = %self.model, "Requesting extraction");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text, source_filename))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = resp.json().await?;
        let candidates = parse_completion(completion)?;
        info!(file = source_filename, count = candidates.len(), "Extracted candidate transactions");
        Ok(candidates)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    #[serde(default)]
    transactions: Vec<CandidateTransaction>,
}

fn parse_completion(completion: ChatCompletion) -> Result<Vec<CandidateTransaction>, LlmError> {
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(LlmError::EmptyResponse)?;
    parse_payload(&content)
}

/// Decodes the `{"transactions": [...]}` object the schema asks for.
pub fn parse_payload(content: &str) -> Result<Vec<CandidateTransaction>, LlmError> {
    let payload: ExtractionPayload = serde_json::from_str(content)?;
    Ok(payload.transactions)
}

fn extraction_schema() -> Value {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "transactions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "date": { "type": "string", "description": "Transaction date in YYYY-MM-DD format" },
                        "description": { "type": "string", "description": "Transaction description as it appears in statement" },
                        "amount": { "type": "number", "description": "Transaction amount (negative for expenses, positive for income)" },
                        "merchant_canonical": { "type": "string", "description": "Standardized merchant name" },
                        "category": { "type": "string", "enum": categories, "description": "Transaction category" },
                        "confidence": { "type": "number", "description": "Confidence score for categorization (0.0 to 1.0)" },
                    },
                    "required": ["date", "description", "amount", "merchant_canonical", "category", "confidence"],
                },
            },
        },
        "required": ["transactions"],
    })
}

// ── Mock backend (tests) ──────────────────────────────────────────────────────

/// Returns preset candidates keyed by source filename. Unknown files yield
/// no transactions.
#[derive(Debug, Default)]
pub struct MockTransactionExtractor {
    responses: HashMap<String, Result<Vec<CandidateTransaction>, String>>,
    calls: AtomicUsize,
}

impl MockTransactionExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filename: &str, candidates: Vec<CandidateTransaction>) -> Self {
        self.responses.insert(filename.to_string(), Ok(candidates));
        self
    }

    pub fn failing(mut self, filename: &str, message: &str) -> Self {
        self.responses
            .insert(filename.to_string(), Err(message.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TransactionExtractor for MockTransactionExtractor {
    async fn extract(
        &self,
        _text: &str,
        source_filename: &str,
    ) -> Result<Vec<CandidateTransaction>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(source_filename) {
            Some(Ok(candidates)) => Ok(candidates.clone()),
            Some(Err(message)) => Err(LlmError::Rejected(message.clone())),
            None => Ok(Vec::new()),
        }
    }
}
