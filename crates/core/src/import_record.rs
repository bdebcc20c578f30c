use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportId(pub String);

impl ImportId {
    pub fn from_sequence(n: u64) -> Self {
        ImportId(format!("imp_{n:03}"))
    }

    /// The numeric part of an `imp_NNN` id, if it has one.
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix("imp_")?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audit record of one upload batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: ImportId,
    pub user_id: String,
    /// Original filenames of the batch, joined with `", "`.
    pub file: String,
    pub imported_at: DateTime<Utc>,
    pub num_rows: usize,
}

/// An import record before the store has assigned its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImport {
    pub user_id: String,
    pub file: String,
    pub imported_at: DateTime<Utc>,
    pub num_rows: usize,
}

impl NewImport {
    pub fn for_files<S: AsRef<str>>(user_id: &str, filenames: &[S], num_rows: usize) -> Self {
        let file = filenames
            .iter()
            .map(|f| f.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        NewImport {
            user_id: user_id.to_string(),
            file,
            imported_at: Utc::now(),
            num_rows,
        }
    }

    pub fn into_record(self, id: ImportId) -> ImportRecord {
        ImportRecord {
            id,
            user_id: self.user_id,
            file: self.file,
            imported_at: self.imported_at,
            num_rows: self.num_rows,
        }
    }
}
