pub mod llm;
pub mod pipeline;
pub mod text;

pub use llm::{
    LlmError, MockTransactionExtractor, OpenAiExtractor, TransactionExtractor, DEFAULT_BASE_URL,
    DEFAULT_MODEL,
};
pub use pipeline::{
    IngestError, IngestOutcome, IngestPipeline, IngestSettings, SourceFile, SCHEMA_VERSION,
};
pub use text::{ExtractError, MockTextExtractor, PdfTextExtractor, TextExtractor};
