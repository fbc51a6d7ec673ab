//! REST handlers wrapping the pipelines and backend services.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::{AppState, ErrorBody};
use crate::pipeline::PipelineError;
use crate::router::DataSource;
use crate::types::{
    AgentRequest, HealthResponse, QueryMetadata, QueryRequest, QueryResponse, SearchRequest,
};
use crate::warehouse::QueryOptions;

const HEALTH_CHECK_BUDGET: Duration = Duration::from_secs(5);

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

fn api_key_from_headers(headers: &HeaderMap, header_name: &str) -> String {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// GET /health — per-dependency connectivity, probed concurrently within a
/// short budget.
pub async fn health(State(state): State<AppState>) -> Response {
    let warehouse_check = async {
        match &state.warehouse {
            Some(backend) => {
                match tokio::time::timeout(HEALTH_CHECK_BUDGET, backend.test_connection()).await {
                    Ok(Ok(())) => "ok".to_string(),
                    Ok(Err(err)) => format!("unavailable: {err}"),
                    Err(_) => "unavailable: timeout".to_string(),
                }
            }
            None => "disabled".to_string(),
        }
    };
    let search_check = async {
        match &state.search {
            Some(backend) => {
                match tokio::time::timeout(HEALTH_CHECK_BUDGET, backend.test_connection()).await {
                    Ok(Ok(())) => "ok".to_string(),
                    Ok(Err(err)) => format!("unavailable: {err}"),
                    Err(_) => "unavailable: timeout".to_string(),
                }
            }
            None => "disabled".to_string(),
        }
    };
    let (warehouse_status, search_status) =
        futures::future::join(warehouse_check, search_check).await;

    let degraded = warehouse_status.starts_with("unavailable")
        || search_status.starts_with("unavailable");
    let overall = if degraded { "degraded" } else { "healthy" };

    let mut checks = BTreeMap::new();
    checks.insert("server".to_string(), "ok".to_string());
    checks.insert("warehouse".to_string(), warehouse_status);
    checks.insert("search".to_string(), search_status);

    let status = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(HealthResponse {
            status: overall.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks,
        }),
    )
        .into_response()
}

/// POST /api/v1/query-agent — the agentic pipeline entry point.
pub async fn query_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<AgentRequest>,
) -> Response {
    req.apply_defaults();
    if req.prompt.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "prompt is required");
    }

    let api_key = api_key_from_headers(&headers, &state.api_key_header);

    // Explicit hint wins; otherwise score the prompt.
    let (source, routing_confidence, routing_reasoning) = match req
        .data_source
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        Some(hint) => (
            DataSource::parse(hint).unwrap_or(DataSource::Warehouse),
            1.0,
            "explicitly specified by user".to_string(),
        ),
        None => {
            let routing = state.intent_router.route(&req.prompt);
            (routing.source, routing.confidence, routing.reasoning)
        }
    };

    let result = match source {
        DataSource::Search => match &state.search_pipeline {
            Some(pipeline) => pipeline.handle(&req, &api_key).await,
            None => {
                return error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "search backend is not configured",
                )
            }
        },
        DataSource::Warehouse => match &state.warehouse_pipeline {
            Some(pipeline) => pipeline.handle(&req, &api_key).await,
            None => {
                return error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "warehouse backend is not configured",
                )
            }
        },
    };

    match result {
        Ok(mut resp) => {
            resp.agent_metadata.set("routing_confidence", routing_confidence);
            resp.agent_metadata
                .set("routing_reasoning", routing_reasoning);
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(PipelineError::Blocked(mut resp)) => {
            resp.agent_metadata.set("routing_confidence", routing_confidence);
            resp.agent_metadata
                .set("routing_reasoning", routing_reasoning);
            (StatusCode::BAD_REQUEST, Json(*resp)).into_response()
        }
        Err(PipelineError::Fatal(err)) => {
            tracing::error!(error = %err, "agent request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// POST /api/v1/query — direct SELECT execution with the shared guards.
pub async fn execute_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<QueryRequest>,
) -> Response {
    req.apply_defaults();

    let diagnostic = state.sql_validator.validate(&req.sql);
    if !diagnostic.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("SQL validation failed: {diagnostic}"),
        );
    }

    let Some(backend) = &state.warehouse else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "warehouse backend is not configured",
        );
    };

    let api_key = api_key_from_headers(&headers, &state.api_key_header);
    let start = Instant::now();
    let options = QueryOptions {
        project_id: req.project_id.clone(),
        dry_run: req.dry_run,
        timeout_ms: req.timeout_ms,
        use_query_cache: req.use_query_cache,
    };

    let result = match backend.execute_query(&req.sql, &options).await {
        Ok(result) => result,
        Err(err) => {
            let exec_ms = start.elapsed().as_millis() as i64;
            state
                .audit_logger
                .log_query(&req.sql, &api_key, "", exec_ms, 0, 0, false, &err.to_string());
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("query execution failed: {err}"),
            );
        }
    };

    let exec_ms = start.elapsed().as_millis() as i64;

    let (ok, cost_error) = state.cost_tracker.check_limits(result.total_bytes_processed);
    if !ok {
        state.audit_logger.log_query(
            &req.sql,
            &api_key,
            "",
            exec_ms,
            0,
            result.total_bytes_processed,
            false,
            &cost_error,
        );
        return error_response(StatusCode::TOO_MANY_REQUESTS, cost_error);
    }

    state
        .cost_tracker
        .log_query_cost(&req.sql, result.total_bytes_processed, &api_key, exec_ms);

    let data = if state.enable_data_masking {
        state.data_masker.mask_rows(&result.data)
    } else {
        result.data
    };

    state.audit_logger.log_query(
        &req.sql,
        &api_key,
        "",
        exec_ms,
        data.len(),
        result.total_bytes_processed,
        true,
        "",
    );

    (
        StatusCode::OK,
        Json(QueryResponse {
            status: "success".to_string(),
            row_count: data.len(),
            data,
            columns: result.columns,
            metadata: QueryMetadata {
                job_id: result.job_id,
                total_bytes_processed: result.total_bytes_processed,
                bytes_billed: result.bytes_billed,
                cache_hit: result.cache_hit,
                execution_time_ms: exec_ms,
            },
        }),
    )
        .into_response()
}

/// GET /api/v1/datasets
pub async fn list_datasets(State(state): State<AppState>) -> Response {
    let Some(backend) = &state.warehouse else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "warehouse backend is not configured",
        );
    };
    match backend.list_datasets().await {
        Ok(datasets) => (StatusCode::OK, Json(datasets)).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// GET /api/v1/datasets/{dataset_id}/tables
pub async fn list_tables(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> Response {
    let Some(backend) = &state.warehouse else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "warehouse backend is not configured",
        );
    };
    match backend.list_tables(&dataset_id).await {
        Ok(tables) => (StatusCode::OK, Json(tables)).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// POST /api/v1/search — passthrough with allowlist and size clamp.
pub async fn search(
    State(state): State<AppState>,
    Json(mut req): Json<SearchRequest>,
) -> Response {
    req.apply_defaults();

    if req.index.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "index is required");
    }
    if !state.index_allowlist.is_allowed(&req.index) {
        return error_response(
            StatusCode::FORBIDDEN,
            format!("index {:?} is not allowed by the configured patterns", req.index),
        );
    }

    let Some(backend) = &state.search else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "search backend is not configured",
        );
    };

    match backend.search(&req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}
