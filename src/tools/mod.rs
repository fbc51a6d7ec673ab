//! Named tools the agent loop exposes to the LLM.
//!
//! Each tool wraps one backend capability behind a JSON-schema-shaped input
//! descriptor. Executors return a stringified (typically JSON) result; their
//! failures flow back to the model as is-error tool results, never as fatal
//! pipeline errors.

mod search;
mod warehouse;

pub use search::search_tools;
pub use warehouse::warehouse_tools;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::llm::{ToolCall, ToolDefinition};

/// Tool name constants. The agent loop keys its SQL fallback on
/// [`EXECUTE_SQL_TOOL`].
pub const LIST_DATASETS_TOOL: &str = "list_warehouse_datasets";
pub const LIST_TABLES_TOOL: &str = "list_warehouse_tables";
pub const GET_SCHEMA_TOOL: &str = "get_warehouse_schema";
pub const SAMPLE_ROWS_TOOL: &str = "sample_warehouse_rows";
pub const EXECUTE_SQL_TOOL: &str = "execute_warehouse_sql";
pub const LIST_INDICES_TOOL: &str = "list_search_indices";
pub const SEARCH_TOOL: &str = "search_documents";

/// Boxed future returned by tool executors.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executor invoked with the parameter map extracted from a tool-use block.
pub type ToolRunner =
    Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, Result<String, String>> + Send + Sync>;

/// A callable function the LLM can invoke.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    runner: ToolRunner,
}

impl Tool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        runner: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> BoxFuture<'static, Result<String, String>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            runner: Arc::new(runner),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    pub async fn run(&self, input: Map<String, Value>) -> Result<String, String> {
        (self.runner)(input).await
    }
}

/// Result of executing one tool call.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub tool_use_id: String,
    pub output: String,
    pub is_error: bool,
}

/// The tools registered for a single pipeline run. Definitions are fixed at
/// construction; the agent never mutates them.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Tool>,
}

impl ToolSet {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(Tool::definition).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Executes one call. An unknown tool name is reported to the LLM as a
    /// failed tool result so the model can recover.
    pub async fn execute(&self, call: &ToolCall) -> ToolExecution {
        let Some(tool) = self.get(&call.name) else {
            return ToolExecution {
                tool_use_id: call.id.clone(),
                output: format!("error: unknown tool: {}", call.name),
                is_error: true,
            };
        };

        match tool.run(call.input.clone()).await {
            Ok(output) => ToolExecution {
                tool_use_id: call.id.clone(),
                output,
                is_error: false,
            },
            Err(err) => {
                tracing::warn!(tool = %call.name, error = %err, "tool execution error");
                ToolExecution {
                    tool_use_id: call.id.clone(),
                    output: format!("error: {err}"),
                    is_error: true,
                }
            }
        }
    }
}

pub(crate) fn string_arg(input: &Map<String, Value>, key: &str) -> Option<String> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
