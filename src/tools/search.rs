use serde_json::json;

use super::{string_arg, Tool, ToolSet, LIST_INDICES_TOOL, SEARCH_TOOL};
use crate::search::SharedSearch;
use crate::types::{SearchRequest, MAX_SEARCH_SIZE};

/// The standard search tool set: index discovery and query-DSL search.
pub fn search_tools(backend: SharedSearch) -> ToolSet {
    ToolSet::new(vec![list_indices_tool(backend.clone()), search_tool(backend)])
}

fn list_indices_tool(backend: SharedSearch) -> Tool {
    Tool::new(
        LIST_INDICES_TOOL,
        "List all available search indices. Use this to discover which indices are available before searching.",
        json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
        move |_input| {
            let backend = backend.clone();
            Box::pin(async move {
                let indices = backend
                    .list_indices()
                    .await
                    .map_err(|err| format!("list indices: {err}"))?;
                serde_json::to_string(&indices).map_err(|err| err.to_string())
            })
        },
    )
}

fn search_tool(backend: SharedSearch) -> Tool {
    Tool::new(
        SEARCH_TOOL,
        "Search documents using Query DSL. Returns matching documents.",
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "string",
                    "description": "Index pattern to search (e.g., 'logs-*')"
                },
                "query": {
                    "type": "object",
                    "description": "Query DSL object"
                },
                "size": {
                    "type": "integer",
                    "description": "Number of results to return (default: 10, max: 100)"
                }
            },
            "required": ["index"]
        }),
        move |input| {
            let backend = backend.clone();
            Box::pin(async move {
                let index = string_arg(&input, "index").ok_or("index is required")?;

                let size = input
                    .get("size")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as usize)
                    .unwrap_or(10)
                    .min(MAX_SEARCH_SIZE);

                let req = SearchRequest {
                    index,
                    query: input.get("query").filter(|q| q.is_object()).cloned(),
                    size,
                };

                let resp = backend
                    .search(&req)
                    .await
                    .map_err(|err| format!("search: {err}"))?;

                let out = json!({
                    "total_hits": resp.total_hits,
                    "took_ms": resp.took_ms,
                    "hits": resp.hits,
                });
                serde_json::to_string(&out).map_err(|err| err.to_string())
            })
        },
    )
}
