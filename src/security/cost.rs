use super::hash_prefix;

const BYTES_PER_GB: f64 = 1_000_000_000.0;
const WAREHOUSE_COST_PER_TB: f64 = 5.0; // USD

/// Enforces the per-query byte cap and emits cost telemetry.
#[derive(Debug, Clone, Copy)]
pub struct CostTracker {
    max_bytes: i64,
}

impl CostTracker {
    pub fn new(max_bytes: i64) -> Self {
        Self { max_bytes }
    }

    /// Equality passes: a query that processes exactly the cap is allowed.
    pub fn check_limits(&self, total_bytes_processed: i64) -> (bool, String) {
        if total_bytes_processed <= self.max_bytes {
            return (true, String::new());
        }
        let processed_gb = total_bytes_processed as f64 / BYTES_PER_GB;
        let limit_gb = self.max_bytes as f64 / BYTES_PER_GB;
        (
            false,
            format!(
                "Query cost limit exceeded. Processed: {processed_gb:.2}GB, Limit: {limit_gb:.2}GB"
            ),
        )
    }

    /// Emits a structured `query_cost` event with hashed identifiers.
    pub fn log_query_cost(&self, sql: &str, total_bytes_processed: i64, api_key: &str, duration_ms: i64) {
        let processed_gb = total_bytes_processed as f64 / BYTES_PER_GB;
        let cost_usd = processed_gb / 1000.0 * WAREHOUSE_COST_PER_TB;

        tracing::info!(
            event = "query_cost",
            sql_hash = %hash_prefix(sql),
            api_key_hash = %hash_prefix(api_key),
            cost_gb = processed_gb,
            cost_usd = cost_usd,
            duration_ms,
            "query cost"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_passes_the_cap() {
        let tracker = CostTracker::new(1_000);
        let (ok, msg) = tracker.check_limits(1_000);
        assert!(ok);
        assert!(msg.is_empty());
    }

    #[test]
    fn one_byte_over_fails_with_both_values() {
        let tracker = CostTracker::new(10_000_000_000);
        let (ok, msg) = tracker.check_limits(10_000_000_001);
        assert!(!ok);
        assert!(msg.contains("10.00GB"), "{msg}");
        assert!(msg.contains("Limit"), "{msg}");
        assert!(msg.contains("Processed"), "{msg}");
    }

    #[test]
    fn message_formats_gb_to_two_decimals() {
        let tracker = CostTracker::new(1_500_000_000);
        let (_, msg) = tracker.check_limits(2_345_000_000);
        assert!(msg.contains("2.35GB") || msg.contains("2.34GB"), "{msg}");
        assert!(msg.contains("1.50GB"), "{msg}");
    }
}
