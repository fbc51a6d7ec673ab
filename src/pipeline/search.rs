use std::time::{Duration, Instant};

use super::PipelineError;
use crate::agent::QueryAgent;
use crate::search::SharedSearch;
use crate::security::{AuditLogger, PiiDetector, PromptValidator, SearchPromptValidator};
use crate::tools::search_tools;
use crate::types::{truncate, AgentMetadata, AgentRequest, AgentResponse};

const SEARCH_SYSTEM_PROMPT: &str = "You are QueryRelay, an expert in document search and log analysis.

Your task is to help users investigate issues and search for data in the search engine.

RULES:
1. Always use list_search_indices first to discover available indices
2. Build precise, focused queries - never search all documents without filters
3. Use the search_documents tool to execute searches
4. Interpret results and explain findings clearly in Indonesian or English (match user's language)
5. Focus on the specific identifier/time range provided by the user
6. Maximum 100 results per search

Always think step by step:
1. List available indices
2. Build appropriate query for the user's question
3. Execute the search
4. Analyze and explain the results";

/// Orchestrates the NL -> search pipeline. The agent's textual answer is the
/// payload: no SQL extraction, cost checks or masking on this path.
pub struct SearchPipeline {
    agent: QueryAgent,
    backend: SharedSearch,
    pii_detector: PiiDetector,
    prompt_validator: PromptValidator,
    search_validator: SearchPromptValidator,
    audit_logger: AuditLogger,
}

impl SearchPipeline {
    pub fn new(
        agent: QueryAgent,
        backend: SharedSearch,
        pii_detector: PiiDetector,
        prompt_validator: PromptValidator,
        search_validator: SearchPromptValidator,
        audit_logger: AuditLogger,
    ) -> Self {
        Self {
            agent,
            backend,
            pii_detector,
            prompt_validator,
            search_validator,
            audit_logger,
        }
    }

    /// Processes one agent request against the search engine.
    pub async fn handle(
        &self,
        req: &AgentRequest,
        api_key: &str,
    ) -> Result<AgentResponse, PipelineError> {
        let start = Instant::now();
        let mut metadata = AgentMetadata::new();
        metadata.set("data_source", "search");
        metadata.set("model", self.agent.model());
        metadata.set("method", "agent");

        // 1. PII detection
        if let Some(keyword) = self.pii_detector.detect(&req.prompt) {
            metadata.set("pii_check", format!("blocked: {keyword}"));
            return Err(PipelineError::blocked(AgentResponse::error(
                &req.prompt,
                metadata,
            )));
        }
        metadata.set("pii_check", "passed");

        // 2. General prompt validation
        let validation = self.prompt_validator.validate(&req.prompt);
        if !validation.valid {
            metadata.set("prompt_validation", format!("blocked: {}", validation.message));
            return Err(PipelineError::blocked(AgentResponse::error(
                &req.prompt,
                metadata,
            )));
        }
        metadata.set("prompt_validation", "passed");

        // 3. Search prompts additionally need a concrete identifier.
        let search_validation = self.search_validator.validate(&req.prompt);
        if !search_validation.valid {
            metadata.set(
                "es_validation",
                format!("blocked: {}", search_validation.message),
            );
            return Err(PipelineError::blocked(AgentResponse::error(
                &req.prompt,
                metadata,
            )));
        }
        metadata.set(
            "es_validation",
            format!("passed: {}", search_validation.identifier_class),
        );

        // 4. Agent loop under the request deadline
        let tools = search_tools(self.backend.clone());
        let deadline = Instant::now() + Duration::from_secs(req.timeout);
        let outcome = self
            .agent
            .run(deadline, SEARCH_SYSTEM_PROMPT, &req.prompt, &tools)
            .await
            .map_err(|failure| {
                tracing::warn!(
                    tools_used = failure.tools_used.len(),
                    error = %failure.error,
                    "agent run failed"
                );
                PipelineError::Fatal(failure.error)
            })?;

        metadata.set("tools_used", outcome.tools_used.clone());

        let execution_time_ms = start.elapsed().as_millis() as i64;
        self.audit_logger
            .log_agent_request(&req.prompt, api_key, "", true, execution_time_ms);

        Ok(AgentResponse {
            status: "success".to_string(),
            prompt: req.prompt.clone(),
            generated_sql: None,
            execution_result: None,
            agent_metadata: metadata,
            reasoning: Some(outcome.text.clone()),
            answer: Some(truncate(&outcome.text, 500)),
        })
    }
}
