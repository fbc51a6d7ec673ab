//! Search backend abstraction plus the REST adapter and index allowlist.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{Error, Result};
use crate::types::{SearchRequest, SearchResponse};

/// Abstracted document search engine.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn test_connection(&self) -> Result<()>;
    async fn list_indices(&self) -> Result<Vec<Value>>;
    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse>;
}

/// Shared handle used across tools and pipelines.
pub type SharedSearch = Arc<dyn SearchBackend>;

/// Glob-style index allowlist. An empty pattern list allows everything.
#[derive(Debug, Clone, Default)]
pub struct IndexAllowlist {
    patterns: Vec<String>,
}

impl IndexAllowlist {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.to_vec(),
        }
    }

    pub fn is_allowed(&self, index: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        for pattern in &self.patterns {
            if glob_match(pattern, index) {
                return true;
            }
            // A pattern ending in '*' also accepts plain prefix matches.
            let prefix = pattern.trim_end_matches('*');
            if prefix != pattern && index.starts_with(prefix) {
                return true;
            }
        }
        false
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

// `*` matches any run of characters, `?` a single one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Configuration for the REST adapter.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// REST adapter for an Elasticsearch-class search API.
pub struct RestSearch {
    http: reqwest::Client,
    base_url: reqwest::Url,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct SearchWireResponse {
    #[serde(default)]
    took: u64,
    hits: SearchWireHits,
}

#[derive(Deserialize)]
struct SearchWireHits {
    #[serde(default)]
    total: SearchWireTotal,
    #[serde(default)]
    hits: Vec<Value>,
}

#[derive(Deserialize, Default)]
struct SearchWireTotal {
    #[serde(default)]
    value: u64,
}

impl RestSearch {
    pub fn new(cfg: SearchConfig) -> Result<Self> {
        if cfg.base_url.trim().is_empty() {
            return Err(Error::Config("search base url is required".to_string()));
        }
        let base_url = reqwest::Url::parse(cfg.base_url.trim_end_matches('/'))
            .map_err(|err| Error::Config(format!("invalid search base url: {err}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            base_url,
            username: cfg.username,
            password: cfg.password,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> Result<reqwest::Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::Config(format!("invalid path: {err}")))
    }
}

#[async_trait]
impl SearchBackend for RestSearch {
    async fn test_connection(&self) -> Result<()> {
        let resp = self
            .authorized(self.http.get(self.url("/")?))
            .send()
            .await
            .map_err(Error::Http)?;
        if !resp.status().is_success() {
            return Err(Error::Backend(format!("ping error: {}", resp.status())));
        }
        Ok(())
    }

    async fn list_indices(&self) -> Result<Vec<Value>> {
        let resp = self
            .authorized(self.http.get(self.url("/_cat/indices?format=json")?))
            .send()
            .await
            .map_err(Error::Http)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("list indices: {status}")));
        }
        resp.json().await.map_err(Error::Http)
    }

    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        let path = format!("/{}/_search", req.index);
        let mut body = json!({ "size": req.size });
        if let Some(query) = &req.query {
            body["query"] = query.clone();
        }
        let resp = self
            .authorized(self.http.post(self.url(&path)?))
            .json(&body)
            .send()
            .await
            .map_err(Error::Http)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(200).collect();
            return Err(Error::Backend(format!("search failed ({status}): {excerpt}")));
        }
        let wire: SearchWireResponse = resp.json().await.map_err(Error::Http)?;
        Ok(SearchResponse {
            total_hits: wire.hits.total.value,
            took_ms: wire.took,
            hits: wire.hits.hits,
        })
    }
}
