//! Warehouse backend abstraction plus the REST adapter.
//!
//! The agent, the tools and the pipelines only see [`WarehouseBackend`];
//! tests swap in the in-memory double from [`crate::testing`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::types::{DatasetInfo, Row, TableInfo, TableSchema};

/// Execution options for a single query.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub project_id: Option<String>,
    pub dry_run: bool,
    pub timeout_ms: u64,
    pub use_query_cache: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            project_id: None,
            dry_run: false,
            timeout_ms: 60_000,
            use_query_cache: true,
        }
    }
}

/// Result of a warehouse execution, including job metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Row>,
    pub columns: Vec<String>,
    pub job_id: String,
    pub total_bytes_processed: i64,
    pub bytes_billed: i64,
    pub cache_hit: bool,
    pub execution_time_ms: i64,
    pub total_rows: i64,
}

/// Abstracted analytical warehouse.
#[async_trait]
pub trait WarehouseBackend: Send + Sync {
    async fn test_connection(&self) -> Result<()>;
    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>>;
    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<TableInfo>>;
    async fn table_schema(&self, dataset_id: &str, table_id: &str) -> Result<TableSchema>;
    async fn execute_query(&self, sql: &str, opts: &QueryOptions) -> Result<QueryResult>;
}

/// Shared handle used across tools, cache and pipelines.
pub type SharedWarehouse = Arc<dyn WarehouseBackend>;

/// Configuration for the REST adapter.
#[derive(Debug, Clone, Default)]
pub struct WarehouseConfig {
    pub base_url: String,
    pub project_id: String,
    pub token: Option<String>,
}

/// REST adapter for a BigQuery-class warehouse API.
pub struct RestWarehouse {
    http: reqwest::Client,
    base_url: reqwest::Url,
    project_id: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct DatasetsWire {
    #[serde(default)]
    datasets: Vec<DatasetInfo>,
}

#[derive(Deserialize)]
struct TablesWire {
    #[serde(default)]
    tables: Vec<TableInfo>,
}

#[derive(Serialize)]
struct QueryWireRequest<'a> {
    query: &'a str,
    timeout_ms: u64,
    dry_run: bool,
    use_query_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryWireResponse {
    #[serde(default)]
    job_id: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    total_bytes_processed: i64,
    #[serde(default)]
    bytes_billed: i64,
    #[serde(default)]
    cache_hit: bool,
}

impl RestWarehouse {
    pub fn new(cfg: WarehouseConfig) -> Result<Self> {
        if cfg.base_url.trim().is_empty() {
            return Err(Error::Config("warehouse base url is required".to_string()));
        }
        let base_url = reqwest::Url::parse(cfg.base_url.trim_end_matches('/'))
            .map_err(|err| Error::Config(format!("invalid warehouse base url: {err}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            base_url,
            project_id: cfg.project_id,
            token: cfg.token,
        })
    }

    fn url(&self, path: &str) -> Result<reqwest::Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::Config(format!("invalid path: {err}")))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .authorized(self.http.get(self.url(path)?))
            .send()
            .await
            .map_err(Error::Http)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(Error::Backend(format!("warehouse {status}: {excerpt}")));
        }
        resp.json().await.map_err(Error::Http)
    }
}

#[async_trait]
impl WarehouseBackend for RestWarehouse {
    async fn test_connection(&self) -> Result<()> {
        self.execute_query(
            "SELECT 1",
            &QueryOptions {
                timeout_ms: 5_000,
                ..QueryOptions::default()
            },
        )
        .await
        .map(|_| ())
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>> {
        let wire: DatasetsWire = self
            .get_json(&format!("/v1/projects/{}/datasets", self.project_id))
            .await?;
        Ok(wire.datasets)
    }

    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<TableInfo>> {
        let wire: TablesWire = self
            .get_json(&format!(
                "/v1/projects/{}/datasets/{dataset_id}/tables",
                self.project_id
            ))
            .await?;
        Ok(wire.tables)
    }

    async fn table_schema(&self, dataset_id: &str, table_id: &str) -> Result<TableSchema> {
        self.get_json(&format!(
            "/v1/projects/{}/datasets/{dataset_id}/tables/{table_id}/schema",
            self.project_id
        ))
        .await
    }

    async fn execute_query(&self, sql: &str, opts: &QueryOptions) -> Result<QueryResult> {
        let url = self.url(&format!("/v1/projects/{}/queries", self.project_id))?;
        let body = QueryWireRequest {
            query: sql,
            timeout_ms: opts.timeout_ms,
            dry_run: opts.dry_run,
            use_query_cache: opts.use_query_cache,
            project_id: opts.project_id.as_deref(),
        };

        let start = Instant::now();
        let resp = self
            .authorized(self.http.post(url))
            .timeout(Duration::from_millis(opts.timeout_ms))
            .json(&body)
            .send()
            .await
            .map_err(Error::Http)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(200).collect();
            return Err(Error::Backend(format!("query failed ({status}): {excerpt}")));
        }
        let wire: QueryWireResponse = resp.json().await.map_err(Error::Http)?;
        let execution_time_ms = start.elapsed().as_millis() as i64;

        let total_rows = wire.rows.len() as i64;
        Ok(QueryResult {
            data: wire.rows,
            columns: wire.columns,
            job_id: wire.job_id,
            total_bytes_processed: wire.total_bytes_processed,
            bytes_billed: wire.bytes_billed,
            cache_hit: wire.cache_hit,
            execution_time_ms,
            total_rows,
        })
    }
}
