//! HTTP surface: state assembly, router construction and middleware wiring.

mod handlers;
mod middleware;

pub use middleware::{api_key_from_request, PUBLIC_PATHS, REQUEST_ID_HEADER};

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::QueryAgent;
use crate::config::Config;
use crate::errors::Result;
use crate::llm::{LlmClient, LlmConfig};
use crate::pipeline::{SearchPipeline, WarehousePipeline};
use crate::ratelimit::RateLimiter;
use crate::router::IntentRouter;
use crate::search::{IndexAllowlist, RestSearch, SearchConfig, SharedSearch};
use crate::security::{
    AuditLogger, CostTracker, DataMasker, PiiDetector, PromptValidator, SearchPromptValidator,
    SqlValidator,
};
use crate::warehouse::{RestWarehouse, SharedWarehouse, WarehouseConfig};

/// Plain error body served for non-pipeline failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Shared application state: pipelines, backends and process-lifetime
/// security singletons.
#[derive(Clone)]
pub struct AppState {
    pub warehouse_pipeline: Option<Arc<WarehousePipeline>>,
    pub search_pipeline: Option<Arc<SearchPipeline>>,
    pub intent_router: IntentRouter,
    pub warehouse: Option<SharedWarehouse>,
    pub search: Option<SharedSearch>,
    pub sql_validator: SqlValidator,
    pub cost_tracker: CostTracker,
    pub data_masker: DataMasker,
    pub audit_logger: AuditLogger,
    pub index_allowlist: IndexAllowlist,
    pub enable_data_masking: bool,
    pub api_key_header: String,
    pub api_keys: Arc<HashSet<String>>,
    pub enable_auth: bool,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wires backends, the LLM client and both pipelines from configuration.
    /// Missing credentials disable the corresponding surface instead of
    /// failing startup.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let warehouse: Option<SharedWarehouse> =
            if cfg.warehouse_enabled && !cfg.warehouse_base_url.is_empty() {
                let backend = RestWarehouse::new(WarehouseConfig {
                    base_url: cfg.warehouse_base_url.clone(),
                    project_id: cfg.warehouse_project_id.clone(),
                    token: if cfg.warehouse_token.is_empty() {
                        None
                    } else {
                        Some(cfg.warehouse_token.clone())
                    },
                })?;
                Some(Arc::new(backend))
            } else {
                tracing::warn!("warehouse backend disabled");
                None
            };

        let search: Option<SharedSearch> = if cfg.search_enabled && !cfg.search_base_url.is_empty()
        {
            let backend = RestSearch::new(SearchConfig {
                base_url: cfg.search_base_url.clone(),
                username: if cfg.search_username.is_empty() {
                    None
                } else {
                    Some(cfg.search_username.clone())
                },
                password: if cfg.search_password.is_empty() {
                    None
                } else {
                    Some(cfg.search_password.clone())
                },
            })?;
            Some(Arc::new(backend))
        } else {
            tracing::warn!("search backend disabled");
            None
        };

        let agent = if cfg.anthropic_api_key.is_empty() {
            tracing::warn!("ANTHROPIC_API_KEY not set - AI agent disabled");
            None
        } else {
            let llm = LlmClient::new(LlmConfig {
                api_key: cfg.anthropic_api_key.clone(),
                model: cfg.llm_model.clone(),
                base_url: if cfg.anthropic_base_url.is_empty() {
                    None
                } else {
                    Some(cfg.anthropic_base_url.clone())
                },
                ..LlmConfig::default()
            })?;
            Some(QueryAgent::new(llm))
        };

        let pii_keywords: &[String] = if cfg.enable_pii_detection {
            &cfg.pii_keywords
        } else {
            &[]
        };
        let pii_detector = PiiDetector::new(pii_keywords);
        let prompt_validator = PromptValidator::new();
        let sql_validator = SqlValidator::new();
        let search_validator = SearchPromptValidator::new();
        let cost_tracker = CostTracker::new(cfg.max_query_bytes_processed);
        let data_masker = DataMasker::new(&cfg.sensitive_columns);
        let audit_logger = AuditLogger::new(cfg.enable_audit_logging);

        let warehouse_pipeline = match (&agent, &warehouse) {
            (Some(agent), Some(backend)) => Some(Arc::new(WarehousePipeline::new(
                agent.clone(),
                backend.clone(),
                pii_detector.clone(),
                prompt_validator,
                sql_validator,
                cost_tracker,
                data_masker.clone(),
                audit_logger,
            ))),
            _ => None,
        };

        let search_pipeline = match (&agent, &search) {
            (Some(agent), Some(backend)) => Some(Arc::new(SearchPipeline::new(
                agent.clone(),
                backend.clone(),
                pii_detector.clone(),
                prompt_validator,
                search_validator,
                audit_logger,
            ))),
            _ => None,
        };

        tracing::info!(
            warehouse_enabled = warehouse.is_some(),
            search_enabled = search.is_some(),
            agent_enabled = agent.is_some(),
            auth_enabled = cfg.enable_auth && !cfg.api_keys.is_empty(),
            data_masking = cfg.enable_data_masking,
            audit_logging = cfg.enable_audit_logging,
            pii_detection = cfg.enable_pii_detection,
            "service configuration"
        );

        let rate_limiter = Arc::new(RateLimiter::new(cfg.rate_limit_per_minute));
        rate_limiter.spawn_sweeper();

        Ok(Self {
            warehouse_pipeline,
            search_pipeline,
            intent_router: IntentRouter::new(),
            warehouse,
            search,
            sql_validator,
            cost_tracker,
            data_masker,
            audit_logger,
            index_allowlist: IndexAllowlist::new(&cfg.search_allowed_patterns),
            enable_data_masking: cfg.enable_data_masking,
            api_key_header: cfg.api_key_header.clone(),
            api_keys: Arc::new(cfg.api_keys.iter().cloned().collect()),
            enable_auth: cfg.enable_auth,
            rate_limiter,
        })
    }

    /// Auth is enforced only when enabled and at least one key is known.
    pub fn auth_enforced(&self) -> bool {
        self.enable_auth && !self.api_keys.is_empty()
    }
}

/// Builds the complete router with middleware layers applied.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = cors_layer(cors_origins);

    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .route("/api/v1/query-agent", post(handlers::query_agent))
        .route("/api/v1/query", post(handlers::execute_query))
        .route("/api/v1/datasets", get(handlers::list_datasets))
        .route(
            "/api/v1/datasets/:dataset_id/tables",
            get(handlers::list_tables),
        )
        .route("/api/v1/search", post(handlers::search))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
