// Claimwatch - 277CA acknowledgment parsing + black-hole revenue reconciliation
// Exposes all modules for use in the CLI and tests

pub mod classifier;
pub mod error;
pub mod parser;
pub mod quality;
pub mod reconciliation;
pub mod tokenizer;

// Re-export commonly used types
pub use classifier::{
    ClassificationSummary, ClassifiedResult, StatusClassifier, CATEGORY_ACCEPTED, CATEGORY_REJECTED,
};
pub use error::ParseError;
pub use parser::{
    AckParser, AcknowledgmentRecord, FieldDiagnostic, HierarchyMode, ParsedDocument, ParserConfig,
};
pub use quality::{validate_acknowledgments, QualityWarning, Severity};
pub use reconciliation::{
    create_match_key, AlertSeverity, CacheEntry, PaymentEntry, PaymentRecord, ReconciliationEngine,
    ReconciliationReport, ReconciliationSummary, UnsubmittedAlert,
};
pub use tokenizer::{tokenize, Delimiters, Segment};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
