//! QueryRelay: a natural-language query gateway.
//!
//! Free-form prompts are routed to an analytical warehouse or a document
//! search engine, translated into executable queries by an LLM tool-calling
//! loop, executed under cost and safety controls, and returned masked with a
//! natural-language explanation.

pub mod agent;
pub mod config;
pub mod errors;
pub mod llm;
pub mod pipeline;
pub mod ratelimit;
pub mod router;
pub mod schema_cache;
pub mod search;
pub mod security;
pub mod server;
pub mod sql_extract;
pub mod testing;
pub mod tools;
pub mod types;
pub mod warehouse;

pub use agent::{AgentFailure, AgentOutcome, QueryAgent};
pub use config::Config;
pub use errors::{Error, Result};
pub use llm::{ContentBlock, LlmClient, LlmConfig, Message, MessagesResponse, StopReason, ToolCall};
pub use pipeline::{PipelineError, SearchPipeline, WarehousePipeline};
pub use router::{DataSource, IntentRouter, RoutingResult};
pub use schema_cache::SchemaPromptCache;
pub use security::{
    AuditLogger, CostTracker, DataMasker, PiiDetector, PromptValidator, SearchPromptValidator,
    SqlValidator,
};
pub use server::{build_router, AppState};
pub use sql_extract::extract_sql;
pub use tools::{Tool, ToolExecution, ToolSet};
pub use types::{
    AgentMetadata, AgentRequest, AgentResponse, MetadataValue, QueryRequest, QueryResponse,
    SearchRequest, SearchResponse,
};
pub use warehouse::{QueryOptions, QueryResult, WarehouseBackend};
