//! Keyword-scored routing between the warehouse and search backends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend a prompt is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Warehouse,
    Search,
}

impl DataSource {
    pub fn as_str(&self) -> &str {
        match self {
            DataSource::Warehouse => "warehouse",
            DataSource::Search => "search",
        }
    }

    /// Parse a user-supplied backend hint.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "warehouse" | "bigquery" => Some(DataSource::Warehouse),
            "search" | "elasticsearch" => Some(DataSource::Search),
            _ => None,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Search-leaning vocabulary: log investigation and real-time lookups.
const SEARCH_KEYWORDS: &[&str] = &[
    "logs",
    "log",
    "exception",
    "stack trace",
    "stacktrace",
    "message",
    "timestamp",
    "warn",
    "debug",
    "elasticsearch",
    "index",
    "document",
    "kibana",
    "last hour",
    "last 24",
    "last minute",
    "investigation",
    "investigate",
    "what happened",
    "troubleshoot",
    "trace id",
    "request id",
    "correlation id",
];

// Warehouse-leaning vocabulary: analytics, reporting, aggregation.
const WAREHOUSE_KEYWORDS: &[&str] = &[
    "table",
    "dataset",
    "row",
    "column",
    "sql",
    "query",
    "analytics",
    "report",
    "aggregate",
    "sum",
    "count",
    "average",
    "bigquery",
    "warehouse",
    "data",
    "metrics",
    "kpi",
    "top",
    "bottom",
    "group by",
    "order by",
    "revenue",
    "sales",
    "transaction",
    "order",
    "payment",
    "user",
    "customer",
    "driver",
    "monthly",
    "daily",
    "weekly",
    "per bulan",
    "per hari",
    "per minggu",
    "total",
    "jumlah",
];

/// Routing decision with the raw per-backend scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingResult {
    pub source: DataSource,
    pub confidence: f64,
    pub search_score: usize,
    pub warehouse_score: usize,
    pub reasoning: String,
}

/// Routes natural-language prompts to the appropriate backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        IntentRouter
    }

    /// Count keyword hits per backend and pick the higher score. Ties and
    /// zero matches default to the warehouse, which carries the stricter
    /// execution guards.
    pub fn route(&self, prompt: &str) -> RoutingResult {
        let lower = prompt.to_lowercase();

        let search_score = SEARCH_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();
        let warehouse_score = WAREHOUSE_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();

        let total = search_score + warehouse_score;
        if total == 0 {
            return RoutingResult {
                source: DataSource::Warehouse,
                confidence: 0.5,
                search_score: 0,
                warehouse_score: 0,
                reasoning: "no strong keywords, defaulting to warehouse".to_string(),
            };
        }

        if search_score > warehouse_score {
            RoutingResult {
                source: DataSource::Search,
                confidence: search_score as f64 / total as f64,
                search_score,
                warehouse_score,
                reasoning: "prompt contains search/log-related keywords".to_string(),
            }
        } else {
            RoutingResult {
                source: DataSource::Warehouse,
                confidence: warehouse_score as f64 / total as f64,
                search_score,
                warehouse_score,
                reasoning: "prompt contains warehouse/analytics-related keywords".to_string(),
            }
        }
    }
}
