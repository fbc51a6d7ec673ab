//! Layered input-validation and output-masking stack.
//!
//! Every guard here is pattern-based, not a parser. False positives and
//! negatives are accepted; the pipeline layers several independent guards
//! (PII, prompt, SQL, cost, masking) so no single one is load-bearing.

mod audit;
mod cost;
mod masker;
mod pii;
mod prompt;
mod search_prompt;
mod sql;

pub use audit::AuditLogger;
pub use cost::CostTracker;
pub use masker::DataMasker;
pub use pii::PiiDetector;
pub use prompt::{PromptValidator, ValidationResult, MAX_PROMPT_LENGTH};
pub use search_prompt::{SearchPromptValidator, SearchValidation};
pub use sql::SqlValidator;

use sha2::{Digest, Sha256};

/// SHA-256 of `value`, truncated to the first 16 hex characters. Raw
/// prompts, keys and SQL never leave the process through log channels.
pub fn hash_prefix(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}
