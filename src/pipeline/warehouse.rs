use std::time::{Duration, Instant};

use super::PipelineError;
use crate::agent::QueryAgent;
use crate::schema_cache::SchemaPromptCache;
use crate::security::{
    AuditLogger, CostTracker, DataMasker, PiiDetector, PromptValidator, SqlValidator,
};
use crate::sql_extract::extract_sql;
use crate::tools::warehouse_tools;
use crate::types::{truncate, AgentMetadata, AgentRequest, AgentResponse, QueryMetadata, QueryResponse};
use crate::warehouse::{QueryOptions, SharedWarehouse};

const BASE_SYSTEM_PROMPT: &str = "You are QueryRelay, an expert data analyst with deep knowledge of warehouse SQL.

Your task is to help users query their warehouse data using natural language.

RULES:
1. Generate only SELECT queries - never INSERT, UPDATE, DELETE, DROP, or DDL
2. Always add LIMIT clause (max 1000 rows) unless user specifies otherwise
3. Use fully qualified table names: `dataset.table`
4. ALWAYS wrap your final SQL in a code block exactly like this:
```sql
SELECT ...
```
5. Execute the SQL exactly once after writing it
6. Explain results in plain language
7. For JOIN queries: use sample_warehouse_rows to verify join key values match before executing";

/// Orchestrates the NL -> SQL -> execute pipeline.
pub struct WarehousePipeline {
    agent: QueryAgent,
    backend: SharedWarehouse,
    pii_detector: PiiDetector,
    prompt_validator: PromptValidator,
    sql_validator: SqlValidator,
    cost_tracker: CostTracker,
    data_masker: DataMasker,
    audit_logger: AuditLogger,
    schema_cache: SchemaPromptCache,
}

impl WarehousePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: QueryAgent,
        backend: SharedWarehouse,
        pii_detector: PiiDetector,
        prompt_validator: PromptValidator,
        sql_validator: SqlValidator,
        cost_tracker: CostTracker,
        data_masker: DataMasker,
        audit_logger: AuditLogger,
    ) -> Self {
        Self {
            agent,
            backend,
            pii_detector,
            prompt_validator,
            sql_validator,
            cost_tracker,
            data_masker,
            audit_logger,
            schema_cache: SchemaPromptCache::new(),
        }
    }

    /// Overrides the schema-cache TTL (defaults to 5 minutes).
    pub fn with_schema_cache_ttl(mut self, ttl: Duration) -> Self {
        self.schema_cache = SchemaPromptCache::with_ttl(ttl);
        self
    }

    /// Cached system prompt pre-loaded with the dataset schema. Concurrent
    /// misses for the same dataset share a single backend fetch; a failed
    /// listing falls back to the base prompt without caching so the next
    /// request retries.
    pub async fn build_system_prompt(&self, dataset_id: &str) -> String {
        if dataset_id.is_empty() {
            return BASE_SYSTEM_PROMPT.to_string();
        }

        if let Some(prompt) = self.schema_cache.get(dataset_id).await {
            tracing::debug!(dataset = dataset_id, "schema cache hit");
            return prompt;
        }

        let flight = self.schema_cache.flight_lock(dataset_id).await;
        let _guard = flight.lock().await;

        // Another coalesced winner may have populated the cache while this
        // caller waited for the flight slot.
        if let Some(prompt) = self.schema_cache.get(dataset_id).await {
            return prompt;
        }

        tracing::debug!(dataset = dataset_id, "schema cache miss, fetching from warehouse");
        let fetch_start = Instant::now();

        let tables = match self.backend.list_tables(dataset_id).await {
            Ok(tables) => tables,
            Err(err) => {
                tracing::warn!(dataset = dataset_id, error = %err, "schema pre-load failed");
                self.schema_cache.release_flight(dataset_id).await;
                return BASE_SYSTEM_PROMPT.to_string();
            }
        };

        let mut prompt = String::from(BASE_SYSTEM_PROMPT);
        prompt.push_str(&format!("\n\n## Available Dataset: {dataset_id}\n"));
        prompt.push_str("The following tables and schemas are already available to you:\n\n");

        for table in &tables {
            match self.backend.table_schema(dataset_id, &table.id).await {
                Ok(schema) => {
                    prompt.push_str(&format!(
                        "### {dataset_id}.{} ({} rows)\n",
                        table.id, schema.num_rows
                    ));
                    prompt.push_str(&schema.render());
                    prompt.push('\n');
                }
                Err(err) => {
                    tracing::warn!(table = %table.id, error = %err, "pre-load schema: get schema failed");
                    continue;
                }
            }
        }

        prompt.push_str(
            "\nSince schemas are already provided above, you can skip list_warehouse_tables and \
             get_warehouse_schema tool calls. Go directly to sample_warehouse_rows for JOIN \
             queries, then write and execute the SQL.",
        );

        self.schema_cache.insert(dataset_id, prompt.clone()).await;
        self.schema_cache.release_flight(dataset_id).await;

        tracing::info!(
            dataset = dataset_id,
            tables = tables.len(),
            fetch_ms = fetch_start.elapsed().as_millis() as u64,
            "schema cached"
        );

        prompt
    }

    /// Processes one agent request against the warehouse.
    pub async fn handle(
        &self,
        req: &AgentRequest,
        api_key: &str,
    ) -> Result<AgentResponse, PipelineError> {
        let start = Instant::now();
        let mut metadata = AgentMetadata::new();
        metadata.set("data_source", "warehouse");
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

        // 2. Prompt validation
        let validation = self.prompt_validator.validate(&req.prompt);
        if !validation.valid {
            metadata.set("prompt_validation", format!("blocked: {}", validation.message));
            return Err(PipelineError::blocked(AgentResponse::error(
                &req.prompt,
                metadata,
            )));
        }
        metadata.set("prompt_validation", "passed");

        // 3. Tools + cached schema prompt
        let tools = warehouse_tools(self.backend.clone());
        let dataset_id = req.dataset_id.as_deref().unwrap_or("");
        let system_prompt = self.build_system_prompt(dataset_id).await;

        // 4. Agent loop under the request deadline
        let deadline = Instant::now() + Duration::from_secs(req.timeout);
        let outcome = self
            .agent
            .run(deadline, &system_prompt, &req.prompt, &tools)
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

        // 5. Extract SQL; fall back to the last tool-executed statement when
        // the model leaves the query out of its reply.
        let mut generated_sql = extract_sql(&outcome.text);
        if generated_sql.is_empty() {
            if let Some(last) = &outcome.last_executed_sql {
                generated_sql = last.clone();
                tracing::debug!(sql = %truncate(&generated_sql, 60), "using last executed SQL as fallback");
            }
        }
        metadata.set("sql_validation", "n/a");
        metadata.set("cost_tracking", "n/a");
        metadata.set("data_masking", "n/a");

        let mut execution_result: Option<QueryResponse> = None;

        if !generated_sql.is_empty() && !req.dry_run {
            // 6. SQL validation: the only gate between extraction and the
            // warehouse.
            let diagnostic = self.sql_validator.validate(&generated_sql);
            if !diagnostic.is_empty() {
                metadata.set("sql_validation", format!("blocked: {diagnostic}"));
                return Err(PipelineError::blocked(AgentResponse::error(
                    &req.prompt,
                    metadata,
                )));
            }
            metadata.set("sql_validation", "passed");

            // 7. Execute, then cost-check, mask and attach the result.
            let options = QueryOptions {
                project_id: req.project_id.clone(),
                ..QueryOptions::default()
            };
            let query_start = Instant::now();
            match self.backend.execute_query(&generated_sql, &options).await {
                Ok(result) => {
                    let query_ms = query_start.elapsed().as_millis() as i64;
                    let (ok, cost_error) =
                        self.cost_tracker.check_limits(result.total_bytes_processed);
                    if !ok {
                        metadata.set("cost_tracking", format!("blocked: {cost_error}"));
                    } else {
                        self.cost_tracker.log_query_cost(
                            &generated_sql,
                            result.total_bytes_processed,
                            api_key,
                            query_ms,
                        );
                        metadata.set("cost_tracking", "ok");

                        let data = self.data_masker.mask_rows(&result.data);
                        metadata.set("data_masking", "applied");

                        execution_result = Some(QueryResponse {
                            status: "success".to_string(),
                            row_count: data.len(),
                            data,
                            columns: result.columns,
                            metadata: QueryMetadata {
                                job_id: result.job_id,
                                total_bytes_processed: result.total_bytes_processed,
                                bytes_billed: result.bytes_billed,
                                cache_hit: result.cache_hit,
                                execution_time_ms: query_ms,
                            },
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "query execution failed");
                }
            }
        }

        let execution_time_ms = start.elapsed().as_millis() as i64;
        self.audit_logger.log_agent_request(
            &req.prompt,
            api_key,
            &generated_sql,
            true,
            execution_time_ms,
        );

        Ok(AgentResponse {
            status: "success".to_string(),
            prompt: req.prompt.clone(),
            generated_sql: Some(generated_sql),
            execution_result,
            agent_metadata: metadata,
            reasoning: Some(truncate(&outcome.text, 500)),
            answer: None,
        })
    }
}
