//! Bounded multi-turn tool-calling loop.
//!
//! The loop owns all LLM interaction: it sends the conversation plus the
//! tool catalog, executes whatever tool calls come back, and feeds the
//! results into the next turn. Two bounds keep a non-terminating model in
//! check: a forced tool-less answer at iteration 7 and a hard cap of 10.

use std::time::{Duration, Instant};

use crate::errors::{Error, Result};
use crate::llm::{ContentBlock, LlmClient, Message, ToolDefinition};
use crate::tools::{ToolSet, EXECUTE_SQL_TOOL};

const MAX_ITERATIONS: usize = 10;
const FORCE_ANSWER_AT: usize = 7;
const FORCE_ANSWER_NUDGE: &str =
    "You have enough data. Please provide your final answer now without calling any more tools.";

/// Successful loop result.
#[derive(Debug, Clone, Default)]
pub struct AgentOutcome {
    /// Concatenated text of the terminal response.
    pub text: String,
    /// Tool names in invocation order.
    pub tools_used: Vec<String>,
    /// Last SQL passed to the execute tool; used as a fallback when the
    /// model omits the query from its final reply.
    pub last_executed_sql: Option<String>,
}

/// Failed loop result; the trace survives for diagnostics.
#[derive(Debug)]
pub struct AgentFailure {
    pub error: Error,
    pub tools_used: Vec<String>,
    pub last_executed_sql: Option<String>,
}

/// Drives the LLM tool-calling loop. Cheap to clone; a single `run` is
/// strictly sequential, concurrent runs share nothing mutable.
#[derive(Clone)]
pub struct QueryAgent {
    llm: LlmClient,
}

impl QueryAgent {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Runs the loop until the model stops calling tools or a bound fires.
    /// Every LLM call and tool invocation honors `deadline`.
    pub async fn run(
        &self,
        deadline: Instant,
        system_prompt: &str,
        user_prompt: &str,
        tools: &ToolSet,
    ) -> Result<AgentOutcome, AgentFailure> {
        let tool_defs = tools.definitions();
        let system = if system_prompt.is_empty() {
            None
        } else {
            Some(system_prompt)
        };

        let mut messages = vec![Message::user(user_prompt)];
        let mut tools_used: Vec<String> = Vec::new();
        let mut last_executed_sql: Option<String> = None;

        for iter in 0..MAX_ITERATIONS {
            let response = match self
                .call_llm(deadline, system, &messages, &tool_defs)
                .await
            {
                Ok(resp) => resp,
                Err(error) => {
                    return Err(AgentFailure {
                        error,
                        tools_used,
                        last_executed_sql,
                    })
                }
            };

            let text = response.text();
            let tool_calls = response.tool_calls();

            tracing::debug!(
                iter,
                stop_reason = %response.stop_reason,
                tool_calls = tool_calls.len(),
                text_preview = %crate::types::truncate(&text, 80),
                "agent iteration"
            );

            // Terminal: the model stopped, or it issued no tool calls.
            if response.stop_reason.is_terminal() || tool_calls.is_empty() {
                return Ok(AgentOutcome {
                    text,
                    tools_used,
                    last_executed_sql,
                });
            }

            // Past the soft bound: force a final answer without tools.
            if iter >= FORCE_ANSWER_AT {
                messages.push(Message::assistant_blocks(response.content.clone()));
                messages.push(Message::user(FORCE_ANSWER_NUDGE));

                let final_response = match self.call_llm(deadline, system, &messages, &[]).await {
                    Ok(resp) => resp,
                    Err(error) => {
                        return Err(AgentFailure {
                            error,
                            tools_used,
                            last_executed_sql,
                        })
                    }
                };
                let mut combined = text;
                combined.push_str(&final_response.text());
                return Ok(AgentOutcome {
                    text: combined,
                    tools_used,
                    last_executed_sql,
                });
            }

            messages.push(Message::assistant_blocks(response.content.clone()));

            let mut results: Vec<ContentBlock> = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                tools_used.push(call.name.clone());
                if call.name == EXECUTE_SQL_TOOL {
                    if let Some(sql) = call.input.get("sql").and_then(|v| v.as_str()) {
                        if !sql.is_empty() {
                            last_executed_sql = Some(sql.to_string());
                        }
                    }
                }

                let remaining = match remaining(deadline) {
                    Ok(remaining) => remaining,
                    Err(error) => {
                        return Err(AgentFailure {
                            error,
                            tools_used,
                            last_executed_sql,
                        })
                    }
                };
                let execution = match tokio::time::timeout(remaining, tools.execute(call)).await {
                    Ok(execution) => execution,
                    Err(_) => {
                        return Err(AgentFailure {
                            error: Error::DeadlineExceeded,
                            tools_used,
                            last_executed_sql,
                        })
                    }
                };
                results.push(ContentBlock::tool_result(
                    execution.tool_use_id,
                    execution.output,
                    execution.is_error,
                ));
            }
            messages.push(Message::user_blocks(results));
        }

        Err(AgentFailure {
            error: Error::MaxIterations(MAX_ITERATIONS),
            tools_used,
            last_executed_sql,
        })
    }

    async fn call_llm(
        &self,
        deadline: Instant,
        system: Option<&str>,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<crate::llm::MessagesResponse> {
        let remaining = remaining(deadline)?;
        match tokio::time::timeout(remaining, self.llm.messages(system, messages, tools)).await {
            Ok(result) => result,
            Err(_) => Err(Error::DeadlineExceeded),
        }
    }
}

fn remaining(deadline: Instant) -> Result<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
        .ok_or(Error::DeadlineExceeded)
}
