//! End-to-end per-backend orchestration: validation, cached schema prompt,
//! agent loop, extraction, execution, cost, masking and audit.

mod search;
mod warehouse;

pub use search::SearchPipeline;
pub use warehouse::WarehousePipeline;

use crate::errors::Error;
use crate::types::AgentResponse;

/// How a pipeline run ends when it does not produce a success envelope.
#[derive(Debug)]
pub enum PipelineError {
    /// A guard blocked the request. The response carries the metadata trace
    /// naming the guard; the HTTP layer serves it with status 400.
    Blocked(Box<AgentResponse>),
    /// LLM failure, backend failure, cancellation or iteration exhaustion.
    Fatal(Error),
}

impl PipelineError {
    pub fn blocked(response: AgentResponse) -> Self {
        PipelineError::Blocked(Box::new(response))
    }
}
