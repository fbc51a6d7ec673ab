//! Request, response and result types for the gateway API.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A single result row: column name to value, in column order.
pub type Row = Map<String, Value>;

/// Request body for `POST /api/v1/query-agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    /// "warehouse" | "search"; routed by keyword score when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    /// Agent deadline in seconds, clamped to [10, 600].
    #[serde(default)]
    pub timeout: u64,
}

impl AgentRequest {
    pub fn apply_defaults(&mut self) {
        if self.timeout == 0 {
            self.timeout = 300;
        }
        self.timeout = self.timeout.clamp(10, 600);
    }
}

/// Request body for `POST /api/v1/query` (direct SQL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub use_query_cache: bool,
}

impl QueryRequest {
    pub fn apply_defaults(&mut self) {
        if self.timeout_ms == 0 {
            self.timeout_ms = 60_000;
        }
        self.timeout_ms = self.timeout_ms.clamp(1_000, 300_000);
        if !self.dry_run {
            self.use_query_cache = true;
        }
    }
}

/// Request body for `POST /api/v1/search` and the search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub index: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(default = "default_search_size")]
    pub size: usize,
}

fn default_search_size() -> usize {
    10
}

/// Maximum number of hits a single search may return.
pub const MAX_SEARCH_SIZE: usize = 100;

impl SearchRequest {
    pub fn apply_defaults(&mut self) {
        if self.size == 0 {
            self.size = default_search_size();
        }
        self.size = self.size.min(MAX_SEARCH_SIZE);
    }
}

/// Search hits plus engine-side timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total_hits: u64,
    pub took_ms: u64,
    pub hits: Vec<Value>,
}

/// Warehouse job metadata attached to a query response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub job_id: String,
    pub total_bytes_processed: i64,
    pub bytes_billed: i64,
    pub cache_hit: bool,
    pub execution_time_ms: i64,
}

/// Response body for `POST /api/v1/query` and the embedded execution result
/// of an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub data: Vec<Row>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub metadata: QueryMetadata,
}

/// A warehouse dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// A warehouse table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub id: String,
    #[serde(default)]
    pub dataset_id: String,
    #[serde(default)]
    pub table_type: String,
    #[serde(default)]
    pub num_rows: u64,
    #[serde(default)]
    pub num_bytes: i64,
}

/// A single column of a table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// Schema plus row count for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub num_rows: u64,
}

impl TableSchema {
    /// Human-readable rendering embedded into LLM prompts.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for col in &self.columns {
            out.push_str(&format!("  {} {}\n", col.name, col.column_type));
        }
        out
    }
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: std::collections::BTreeMap<String, String>,
}

/// One telemetry value inside [`AgentMetadata`].
///
/// The value kinds are fixed; the metadata record itself preserves insertion
/// order so the trace reads in pipeline order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Score(f64),
    List(Vec<String>),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Score(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        MetadataValue::List(value)
    }
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetadataValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Ordered key/value telemetry attached to every agent response.
///
/// Serialized as a JSON object; insertion order is preserved and inserting an
/// existing key overwrites in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentMetadata {
    entries: Vec<(String, MetadataValue)>,
}

impl AgentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for AgentMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AgentMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MetadataVisitor;

        impl<'de> Visitor<'de> for MetadataVisitor {
            type Value = AgentMetadata;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a metadata object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut metadata = AgentMetadata::new();
                while let Some((key, value)) = access.next_entry::<String, MetadataValue>()? {
                    metadata.set(key, value);
                }
                Ok(metadata)
            }
        }

        deserializer.deserialize_map(MetadataVisitor)
    }
}

/// Response body for `POST /api/v1/query-agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub status: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<QueryResponse>,
    pub agent_metadata: AgentMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl AgentResponse {
    pub fn error(prompt: impl Into<String>, metadata: AgentMetadata) -> Self {
        Self {
            status: "error".to_string(),
            prompt: prompt.into(),
            generated_sql: None,
            execution_result: None,
            agent_metadata: metadata,
            reasoning: None,
            answer: None,
        }
    }
}

/// Truncate to at most `max` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_request_timeout_clamps() {
        let mut req = AgentRequest {
            prompt: "p".into(),
            project_id: None,
            dataset_id: None,
            data_source: None,
            dry_run: false,
            timeout: 5,
        };
        req.apply_defaults();
        assert_eq!(req.timeout, 10);

        req.timeout = 1000;
        req.apply_defaults();
        assert_eq!(req.timeout, 600);

        req.timeout = 0;
        req.apply_defaults();
        assert_eq!(req.timeout, 300);
    }

    #[test]
    fn search_request_size_clamps() {
        let mut req = SearchRequest {
            index: "logs-*".into(),
            query: None,
            size: 150,
        };
        req.apply_defaults();
        assert_eq!(req.size, 100);
    }

    #[test]
    fn metadata_preserves_insertion_order() {
        let mut meta = AgentMetadata::new();
        meta.set("pii_check", "passed");
        meta.set("prompt_validation", "passed");
        meta.set("routing_confidence", 0.75);
        meta.set("tools_used", vec!["list_warehouse_tables".to_string()]);

        let keys: Vec<&str> = meta.keys().collect();
        assert_eq!(
            keys,
            vec![
                "pii_check",
                "prompt_validation",
                "routing_confidence",
                "tools_used"
            ]
        );

        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.starts_with(r#"{"pii_check":"passed""#));
    }

    #[test]
    fn metadata_set_overwrites_in_place() {
        let mut meta = AgentMetadata::new();
        meta.set("sql_validation", "n/a");
        meta.set("cost_tracking", "n/a");
        meta.set("sql_validation", "passed");

        let keys: Vec<&str> = meta.keys().collect();
        assert_eq!(keys, vec!["sql_validation", "cost_tracking"]);
        assert_eq!(
            meta.get("sql_validation").and_then(|v| v.as_text()),
            Some("passed")
        );
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let mut meta = AgentMetadata::new();
        meta.set("pii_check", "passed");
        meta.set("routing_confidence", 0.5);
        meta.set("tools_used", vec!["execute_warehouse_sql".to_string()]);

        let json = serde_json::to_string(&meta).unwrap();
        let back: AgentMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789abc", 10), "0123456789...");
    }
}
