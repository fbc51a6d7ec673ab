//! In-memory backend doubles and request fixtures shared by the test
//! suites. The doubles count their calls so coalescing behavior can be
//! asserted precisely.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::{Error, Result};
use crate::types::{
    AgentRequest, ColumnInfo, DatasetInfo, Row, SearchRequest, SearchResponse, TableInfo,
    TableSchema,
};
use crate::warehouse::{QueryOptions, QueryResult, WarehouseBackend};
use crate::search::SearchBackend;

/// Warehouse double backed by fixed fixtures.
pub struct StaticWarehouse {
    pub datasets: Vec<DatasetInfo>,
    pub tables: Vec<TableInfo>,
    pub schema: TableSchema,
    pub query_result: QueryResult,
    pub fail_list_tables: bool,
    pub list_tables_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub last_sql: std::sync::Mutex<String>,
}

impl Default for StaticWarehouse {
    fn default() -> Self {
        Self {
            datasets: vec![DatasetInfo {
                id: "analytics".to_string(),
                project_id: "demo".to_string(),
                location: "US".to_string(),
                description: String::new(),
            }],
            tables: vec![TableInfo {
                id: "orders".to_string(),
                dataset_id: "analytics".to_string(),
                table_type: "TABLE".to_string(),
                num_rows: 1000,
                num_bytes: 4096,
            }],
            schema: TableSchema {
                columns: vec![
                    ColumnInfo {
                        name: "user_id".to_string(),
                        column_type: "STRING".to_string(),
                    },
                    ColumnInfo {
                        name: "amount".to_string(),
                        column_type: "FLOAT".to_string(),
                    },
                ],
                num_rows: 1000,
            },
            query_result: QueryResult {
                data: sample_rows(),
                columns: vec!["user_id".to_string(), "c".to_string()],
                job_id: "job_test".to_string(),
                total_bytes_processed: 1024,
                bytes_billed: 1024,
                cache_hit: false,
                execution_time_ms: 3,
                total_rows: 5,
            },
            fail_list_tables: false,
            list_tables_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
            last_sql: std::sync::Mutex::new(String::new()),
        }
    }
}

impl StaticWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_result(mut self, result: QueryResult) -> Self {
        self.query_result = result;
        self
    }

    pub fn failing_list_tables(mut self) -> Self {
        self.fail_list_tables = true;
        self
    }

    pub fn list_tables_count(&self) -> usize {
        self.list_tables_calls.load(Ordering::SeqCst)
    }

    pub fn execute_count(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// The SQL text most recently submitted for execution.
    pub fn last_executed_sql(&self) -> String {
        self.last_sql
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn sample_rows() -> Vec<Row> {
    (1..=5)
        .map(|i| {
            let mut row = Row::new();
            row.insert("user_id".to_string(), json!(format!("u{i}")));
            row.insert("c".to_string(), json!(100 - i));
            row
        })
        .collect()
}

#[async_trait]
impl WarehouseBackend for StaticWarehouse {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>> {
        Ok(self.datasets.clone())
    }

    async fn list_tables(&self, _dataset_id: &str) -> Result<Vec<TableInfo>> {
        self.list_tables_calls.fetch_add(1, Ordering::SeqCst);
        // Small pause so concurrent misses genuinely overlap in tests.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if self.fail_list_tables {
            return Err(Error::Backend("listing unavailable".to_string()));
        }
        Ok(self.tables.clone())
    }

    async fn table_schema(&self, _dataset_id: &str, _table_id: &str) -> Result<TableSchema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str, _opts: &QueryOptions) -> Result<QueryResult> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_sql
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = sql.to_string();
        Ok(self.query_result.clone())
    }
}

/// Search double backed by fixed fixtures.
pub struct StaticSearch {
    pub indices: Vec<Value>,
    pub hits: Vec<Value>,
    pub search_calls: AtomicUsize,
    pub last_size: AtomicUsize,
}

impl Default for StaticSearch {
    fn default() -> Self {
        Self {
            indices: vec![json!({"index": "logs-2024", "docs.count": "120"})],
            hits: vec![json!({"_source": {"message": "timeout", "service": "checkout"}})],
            search_calls: AtomicUsize::new(0),
            last_size: AtomicUsize::new(0),
        }
    }
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_count(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn last_requested_size(&self) -> usize {
        self.last_size.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for StaticSearch {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn list_indices(&self) -> Result<Vec<Value>> {
        Ok(self.indices.clone())
    }

    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.last_size.store(req.size, Ordering::SeqCst);
        Ok(SearchResponse {
            total_hits: self.hits.len() as u64,
            took_ms: 2,
            hits: self.hits.clone(),
        })
    }
}

/// An agent request with sensible test defaults.
pub fn agent_request(prompt: &str) -> AgentRequest {
    let mut req = AgentRequest {
        prompt: prompt.to_string(),
        project_id: None,
        dataset_id: None,
        data_source: None,
        dry_run: false,
        timeout: 60,
    };
    req.apply_defaults();
    req
}
