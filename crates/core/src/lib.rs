pub mod category;
pub mod import_record;
pub mod money;
pub mod period;
pub mod summary;
pub mod transaction;
pub mod user;

pub use category::Category;
pub use import_record::{ImportId, ImportRecord, NewImport};
pub use money::Money;
pub use period::{parse_date, DateRange, DATE_FORMAT};
pub use summary::TransactionSummary;
pub use transaction::{
    CandidateTransaction, ExtractedWith, Transaction, TransactionId, TransactionSource,
    DEFAULT_CURRENCY,
};
pub use user::{User, DEFAULT_USER_ID};
