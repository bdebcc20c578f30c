use std::path::PathBuf;
use std::sync::Arc;

use dompet_classify::{Decision, FallbackClassifier};
use dompet_core::{
    parse_date, CandidateTransaction, ExtractedWith, ImportId, Money, NewImport, Transaction,
    TransactionId, TransactionSource, DEFAULT_CURRENCY, DEFAULT_USER_ID,
};
use dompet_storage::{JsonStore, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::{LlmError, TransactionExtractor, DEFAULT_MODEL};
use crate::text::{ExtractError, TextExtractor};

pub const SCHEMA_VERSION: &str = "txn.v1";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No files provided")]
    EmptyBatch,
    #[error("File {0} is not a PDF")]
    NotPdf(String),
    #[error("Text extraction failed for {file}: {source}")]
    TextExtraction {
        file: String,
        #[source]
        source: ExtractError,
    },
    #[error("Transaction extraction failed for {file}: {source}")]
    LlmExtraction {
        file: String,
        #[source]
        source: LlmError,
    },
    #[error("Invalid transaction in {file}: {reason}")]
    InvalidCandidate { file: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// True when the request itself was bad, before any file was touched.
    pub fn is_validation(&self) -> bool {
        matches!(self, IngestError::EmptyBatch | IngestError::NotPdf(_))
    }
}

/// Values stamped onto every transaction a pipeline creates.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub user_id: String,
    pub currency: String,
    pub model: String,
    pub schema_version: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            model: DEFAULT_MODEL.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

/// An uploaded file: the name the client gave it and where its bytes live now.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub path: PathBuf,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
        }
    }

    fn is_pdf(&self) -> bool {
        self.filename.to_lowercase().ends_with(".pdf")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub success: bool,
    pub parsed_count: usize,
    pub import_id: ImportId,
    pub message: String,
}

/// Orchestrates: validate → text → LLM → classify → one store commit per batch.
pub struct IngestPipeline<T: TextExtractor, L: TransactionExtractor> {
    store: Arc<JsonStore>,
    text: Arc<T>,
    llm: L,
    classifier: FallbackClassifier,
    settings: IngestSettings,
}

impl<T: TextExtractor, L: TransactionExtractor> IngestPipeline<T, L> {
    pub fn new(store: Arc<JsonStore>, text: T, llm: L, settings: IngestSettings) -> Self {
        Self {
            store,
            text: Arc::new(text),
            llm,
            classifier: FallbackClassifier::default(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<JsonStore> {
        &self.store
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }
}

impl<T: TextExtractor + 'static, L: TransactionExtractor> IngestPipeline<T, L> {
    /// Processes every file and persists the result as one import. Any
    /// failure aborts the batch with nothing written.
    pub async fn ingest(&self, files: &[SourceFile]) -> Result<IngestOutcome, IngestError> {
        if files.is_empty() {
            return Err(IngestError::EmptyBatch);
        }
        if let Some(bad) = files.iter().find(|f| !f.is_pdf()) {
            return Err(IngestError::NotPdf(bad.filename.clone()));
        }

        let mut batch = Vec::new();
        for file in files {
            let transactions = self.process_file(file).await?;
            debug!(file = %file.filename, count = transactions.len(), "Processed file");
            batch.extend(transactions);
        }

        let parsed_count = batch.len();
        let filenames: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        let draft = NewImport::for_files(&self.settings.user_id, &filenames, parsed_count);
        let record = self.store.commit_batch(batch, draft).await?;

        info!(import_id = %record.id, files = files.len(), parsed_count, "Import complete");
        Ok(IngestOutcome {
            success: true,
            parsed_count,
            import_id: record.id,
            message: format!(
                "Successfully processed {} file(s) and extracted {} transactions",
                files.len(),
                parsed_count
            ),
        })
    }

    async fn process_file(&self, file: &SourceFile) -> Result<Vec<Transaction>, IngestError> {
        // PDF parsing is CPU-bound; keep it off the async workers.
        let extractor = Arc::clone(&self.text);
        let path = file.path.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract_text(&path))
            .await
            .map_err(|e| ExtractError::Task(e.to_string()))
            .and_then(|extracted| extracted)
            .map_err(|source| IngestError::TextExtraction {
                file: file.filename.clone(),
                source,
            })?;
        if text.is_empty() {
            warn!(file = %file.filename, "No text layer; the extractor will see an empty document");
        }

        let candidates = self
            .llm
            .extract(&text, &file.filename)
            .await
            .map_err(|source| IngestError::LlmExtraction {
                file: file.filename.clone(),
                source,
            })?;

        candidates
            .iter()
            .map(|c| self.build_transaction(c, &file.filename))
            .collect()
    }

    fn build_transaction(
        &self,
        candidate: &CandidateTransaction,
        filename: &str,
    ) -> Result<Transaction, IngestError> {
        let invalid = |reason: String| IngestError::InvalidCandidate {
            file: filename.to_string(),
            reason,
        };
        let date = parse_date(&candidate.date).map_err(invalid)?;
        let amount = Money::from_f64(candidate.amount)
            .ok_or_else(|| invalid(format!("{} is not a representable amount", candidate.amount)))?;

        let decision = self.classifier.explain(candidate);
        match decision {
            Decision::Upstream(_) => {}
            Decision::Keyword { category, keyword } => {
                debug!(description = %candidate.description, %category, keyword, "Keyword fallback");
            }
            Decision::NoMatch => {
                debug!(description = %candidate.description, upstream = %candidate.category, "No keyword matched; using Other");
            }
        }

        Ok(Transaction {
            id: TransactionId::generate(),
            date,
            description_raw: candidate.description.clone(),
            amount,
            currency: self.settings.currency.clone(),
            merchant_canonical: candidate.merchant_canonical.clone(),
            category: decision.category(),
            category_confidence: candidate.confidence,
            is_recurring: false,
            recurring_frequency: None,
            source: TransactionSource {
                file: filename.to_string(),
            },
            extracted_with: ExtractedWith {
                model: self.settings.model.clone(),
                schema_version: self.settings.schema_version.clone(),
            },
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
