use std::collections::HashSet;

use dompet_core::{
    DateRange, ImportId, ImportRecord, NewImport, Transaction, TransactionId, User,
};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The whole persisted collection. Always read and written as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub imports: Vec<ImportRecord>,
}

impl Document {
    /// Zero users, zero transactions, zero imports.
    pub fn empty() -> Self {
        Document::default()
    }

    /// The document written on first access: one local user, nothing else.
    pub fn seeded() -> Self {
        Document {
            users: vec![User::default_local()],
            ..Document::default()
        }
    }

    /// One past the highest `imp_NNN` sequence present, or count + 1 when
    /// no id carries a sequence.
    pub fn next_import_id(&self) -> ImportId {
        let next = self
            .imports
            .iter()
            .filter_map(|i| i.id.sequence())
            .max()
            .map_or(self.imports.len() as u64 + 1, |max| {
                max.max(self.imports.len() as u64) + 1
            });
        ImportId::from_sequence(next)
    }

    /// Appends `batch`, rejecting it whole if any id is already taken.
    pub fn push_transactions(&mut self, batch: Vec<Transaction>) -> Result<(), StoreError> {
        {
            let mut seen: HashSet<&TransactionId> =
                self.transactions.iter().map(|t| &t.id).collect();
            for tx in &batch {
                if !seen.insert(&tx.id) {
                    return Err(StoreError::DuplicateTransactionId(tx.id.clone()));
                }
            }
        }
        self.transactions.extend(batch);
        Ok(())
    }

    pub fn push_import(&mut self, draft: NewImport) -> ImportRecord {
        let record = draft.into_record(self.next_import_id());
        self.imports.push(record.clone());
        record
    }

    /// Transactions inside `range`, newest first. Same-date transactions keep
    /// the order in which they were stored.
    pub fn query_transactions(&self, range: &DateRange) -> Vec<Transaction> {
        let mut matched: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| range.contains(t.date))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date));
        matched
    }

    /// Gives every repeated transaction id a fresh one. The first holder of an
    /// id keeps it. Returns the `(old, new)` id of every renamed transaction.
    pub fn repair_duplicate_ids(&mut self) -> Vec<(TransactionId, TransactionId)> {
        let mut seen: HashSet<TransactionId> = HashSet::new();
        let mut renamed = Vec::new();
        for tx in &mut self.transactions {
            if seen.insert(tx.id.clone()) {
                continue;
            }
            let mut fresh = TransactionId::generate();
            while seen.contains(&fresh) {
                fresh = TransactionId::generate();
            }
            seen.insert(fresh.clone());
            let old = std::mem::replace(&mut tx.id, fresh.clone());
            renamed.push((old, fresh));
        }
        renamed
    }
}
