use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use dompet_core::{
    DateRange, ImportId, ImportRecord, NewImport, Transaction, TransactionSummary,
};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::document::Document;
use crate::error::StoreError;

/// What `load` does when the file exists but cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorruptionPolicy {
    /// Return `StoreError::Corrupted` and leave the file untouched.
    #[default]
    #[serde(rename = "fail")]
    FailClosed,
    /// Move the file aside and carry on with an empty document.
    #[serde(rename = "degrade")]
    DegradeToEmpty,
}

impl std::str::FromStr for CorruptionPolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" | "fail_closed" => Ok(CorruptionPolicy::FailClosed),
            "degrade" | "degrade_to_empty" => Ok(CorruptionPolicy::DegradeToEmpty),
            other => Err(StoreError::UnknownPolicy(other.to_string())),
        }
    }
}

enum ReadOutcome {
    Missing,
    Parsed(Document),
    Corrupt(serde_json::Error),
}

/// Single-file JSON document store.
///
/// Every mutation runs load → mutate → save inside one critical section, so
/// concurrent writers through the same `JsonStore` never lose each other's
/// changes. Saves go to a sibling temp file that is renamed over the target,
/// which means readers see either the old or the new document, never a torn one.
/// Open exactly one `JsonStore` per file and share it (e.g. behind an `Arc`).
pub struct JsonStore {
    path: PathBuf,
    policy: CorruptionPolicy,
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>, policy: CorruptionPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> CorruptionPolicy {
        self.policy
    }

    /// Reads the whole document, creating and persisting the seeded default
    /// when the file does not exist yet.
    pub async fn load(&self) -> Result<Document, StoreError> {
        if let ReadOutcome::Parsed(doc) = self.read_document().await? {
            return Ok(doc);
        }
        // Seeding and quarantining both write, so they happen under the lock.
        let _guard = self.write_lock.lock().await;
        self.load_locked().await
    }

    /// Overwrites the file with `doc`.
    pub async fn save(&self, doc: &Document) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_document(doc).await
    }

    /// Runs `f` against the current document and persists the result if `f`
    /// succeeds. Nothing is written when `f` returns an error.
    pub async fn mutate<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Document) -> Result<R, StoreError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load_locked().await?;
        let out = f(&mut doc)?;
        self.write_document(&doc).await?;
        Ok(out)
    }

    pub async fn append_transactions(&self, batch: Vec<Transaction>) -> Result<(), StoreError> {
        let added = batch.len();
        self.mutate(|doc| doc.push_transactions(batch)).await?;
        debug!(added, "Appended transactions");
        Ok(())
    }

    /// Stores `draft` under the next free import id and returns the record.
    pub async fn append_import(&self, draft: NewImport) -> Result<ImportRecord, StoreError> {
        let record = self.mutate(|doc| Ok(doc.push_import(draft))).await?;
        debug!(import_id = %record.id, "Appended import record");
        Ok(record)
    }

    /// Appends a batch's transactions and its import record in one save.
    pub async fn commit_batch(
        &self,
        batch: Vec<Transaction>,
        draft: NewImport,
    ) -> Result<ImportRecord, StoreError> {
        let rows = batch.len();
        let record = self
            .mutate(|doc| {
                doc.push_transactions(batch)?;
                Ok(doc.push_import(draft))
            })
            .await?;
        info!(import_id = %record.id, rows, "Committed import batch");
        Ok(record)
    }

    /// The id the next import would receive. Only a preview: the id is
    /// assigned for real inside `append_import` / `commit_batch`.
    pub async fn next_import_id(&self) -> Result<ImportId, StoreError> {
        Ok(self.load().await?.next_import_id())
    }

    pub async fn query_transactions(&self, range: &DateRange) -> Result<Vec<Transaction>, StoreError> {
        let doc = self.load().await?;
        let found = doc.query_transactions(range);
        debug!(%range, count = found.len(), "Queried transactions");
        Ok(found)
    }

    pub async fn transaction_count(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.transactions.len())
    }

    pub async fn summary(&self, range: &DateRange) -> Result<TransactionSummary, StoreError> {
        let doc = self.load().await?;
        let in_range = doc.transactions.iter().filter(|t| range.contains(t.date));
        Ok(TransactionSummary::from_transactions(in_range))
    }

    /// Reassigns ids of transactions whose id already appeared earlier in
    /// the file. Returns the number of transactions changed.
    pub async fn repair_duplicate_ids(&self) -> Result<usize, StoreError> {
        let renamed = self.mutate(|doc| Ok(doc.repair_duplicate_ids())).await?;
        for (old, new) in &renamed {
            info!(%old, %new, "Reassigned duplicate transaction id");
        }
        Ok(renamed.len())
    }

    async fn load_locked(&self) -> Result<Document, StoreError> {
        match self.read_document().await? {
            ReadOutcome::Parsed(doc) => Ok(doc),
            ReadOutcome::Missing => {
                let doc = Document::seeded();
                self.write_document(&doc).await?;
                info!(path = %self.path.display(), "Created new store with default user");
                Ok(doc)
            }
            ReadOutcome::Corrupt(source) => match self.policy {
                CorruptionPolicy::FailClosed => {
                    error!(path = %self.path.display(), error = %source, "Store file is corrupted");
                    Err(StoreError::Corrupted {
                        path: self.path.clone(),
                        source,
                    })
                }
                CorruptionPolicy::DegradeToEmpty => {
                    let moved_to = self.quarantine().await?;
                    error!(
                        path = %self.path.display(),
                        moved_to = %moved_to.display(),
                        error = %source,
                        "Store file is corrupted; continuing with an empty document"
                    );
                    Ok(Document::empty())
                }
            },
        }
    }

    async fn read_document(&self) -> Result<ReadOutcome, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
            Err(e) => return Err(e.into()),
        };
        Ok(match serde_json::from_slice::<Document>(&bytes) {
            Ok(doc) => ReadOutcome::Parsed(doc),
            Err(e) => ReadOutcome::Corrupt(e),
        })
    }

    async fn write_document(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(doc)?;
        let tmp = self.sibling(&format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&tmp, &data).await {
            discard_temp(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            discard_temp(&tmp).await;
            return Err(e.into());
        }

        debug!(
            path = %self.path.display(),
            bytes = data.len(),
            transactions = doc.transactions.len(),
            imports = doc.imports.len(),
            "Saved store"
        );
        Ok(())
    }

    /// Renames the unreadable file so a later save cannot overwrite it.
    async fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let target = self.sibling(&format!("corrupt-{stamp}"));
        fs::rename(&self.path, &target).await?;
        Ok(target)
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        self.path.with_file_name(format!("{name}.{suffix}"))
    }
}

/// Best-effort removal of a temp file left by a failed save.
async fn discard_temp(tmp: &Path) {
    match fs::remove_file(tmp).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(tmp = %tmp.display(), error = %e, "Failed to remove temp file"),
    }
}
