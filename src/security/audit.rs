use chrono::Utc;

use super::hash_prefix;

/// Emits hash-identified audit events for query execution and agent
/// requests. Disabled instances drop events silently.
#[derive(Debug, Clone, Copy)]
pub struct AuditLogger {
    enabled: bool,
}

impl AuditLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Records a warehouse query execution.
    #[allow(clippy::too_many_arguments)]
    pub fn log_query(
        &self,
        sql: &str,
        api_key: &str,
        user_context: &str,
        execution_time_ms: i64,
        row_count: usize,
        bytes_processed: i64,
        success: bool,
        error: &str,
    ) {
        if !self.enabled {
            return;
        }
        tracing::info!(
            event = "query_audit",
            at = %Utc::now().to_rfc3339(),
            sql_hash = %hash_prefix(sql),
            api_key_hash = %hash_prefix(api_key),
            user_context,
            execution_time_ms,
            row_count,
            bytes_processed,
            success,
            error = if error.is_empty() { None } else { Some(error) },
            "audit"
        );
    }

    /// Records an agent request.
    pub fn log_agent_request(
        &self,
        prompt: &str,
        api_key: &str,
        generated_sql: &str,
        validation_passed: bool,
        execution_time_ms: i64,
    ) {
        if !self.enabled {
            return;
        }
        let sql_hash = if generated_sql.is_empty() {
            String::new()
        } else {
            hash_prefix(generated_sql)
        };
        tracing::info!(
            event = "agent_audit",
            at = %Utc::now().to_rfc3339(),
            prompt_hash = %hash_prefix(prompt),
            api_key_hash = %hash_prefix(api_key),
            sql_hash = %sql_hash,
            validation_passed,
            execution_time_ms,
            "agent audit"
        );
    }
}
