use serde_json::json;

use super::{
    string_arg, Tool, ToolSet, EXECUTE_SQL_TOOL, GET_SCHEMA_TOOL, LIST_DATASETS_TOOL,
    LIST_TABLES_TOOL, SAMPLE_ROWS_TOOL,
};
use crate::warehouse::{QueryOptions, SharedWarehouse};

/// The standard warehouse tool set: discovery, sampling and execution.
pub fn warehouse_tools(backend: SharedWarehouse) -> ToolSet {
    ToolSet::new(vec![
        list_datasets_tool(backend.clone()),
        list_tables_tool(backend.clone()),
        get_schema_tool(backend.clone()),
        sample_rows_tool(backend.clone()),
        execute_sql_tool(backend),
    ])
}

fn list_datasets_tool(backend: SharedWarehouse) -> Tool {
    Tool::new(
        LIST_DATASETS_TOOL,
        "List all available warehouse datasets in the project. Use this to discover what data is available.",
        json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
        move |_input| {
            let backend = backend.clone();
            Box::pin(async move {
                let datasets = backend
                    .list_datasets()
                    .await
                    .map_err(|err| format!("list datasets: {err}"))?;
                serde_json::to_string(&datasets).map_err(|err| err.to_string())
            })
        },
    )
}

fn list_tables_tool(backend: SharedWarehouse) -> Tool {
    Tool::new(
        LIST_TABLES_TOOL,
        "List all tables in a warehouse dataset.",
        json!({
            "type": "object",
            "properties": {
                "dataset_id": {
                    "type": "string",
                    "description": "The dataset ID"
                }
            },
            "required": ["dataset_id"]
        }),
        move |input| {
            let backend = backend.clone();
            Box::pin(async move {
                let dataset_id =
                    string_arg(&input, "dataset_id").ok_or("dataset_id is required")?;
                let tables = backend
                    .list_tables(&dataset_id)
                    .await
                    .map_err(|err| format!("list tables: {err}"))?;

                let mut out = format!("Tables in dataset {dataset_id:?}:\n");
                for table in &tables {
                    out.push_str(&format!(
                        "  - {} (type: {}, rows: {})\n",
                        table.id, table.table_type, table.num_rows
                    ));
                }
                Ok(out)
            })
        },
    )
}

fn get_schema_tool(backend: SharedWarehouse) -> Tool {
    Tool::new(
        GET_SCHEMA_TOOL,
        "Get the schema (column names and types) for a specific warehouse table. Use this before writing SQL to understand the table structure.",
        json!({
            "type": "object",
            "properties": {
                "dataset_id": {
                    "type": "string",
                    "description": "The dataset ID"
                },
                "table_id": {
                    "type": "string",
                    "description": "The table ID"
                }
            },
            "required": ["dataset_id", "table_id"]
        }),
        move |input| {
            let backend = backend.clone();
            Box::pin(async move {
                let dataset_id =
                    string_arg(&input, "dataset_id").ok_or("dataset_id and table_id are required")?;
                let table_id =
                    string_arg(&input, "table_id").ok_or("dataset_id and table_id are required")?;
                let schema = backend
                    .table_schema(&dataset_id, &table_id)
                    .await
                    .map_err(|err| format!("get schema: {err}"))?;
                Ok(format!(
                    "Table: {dataset_id}.{table_id}\nRows: {}\nSchema:\n{}",
                    schema.num_rows,
                    schema.render()
                ))
            })
        },
    )
}

fn sample_rows_tool(backend: SharedWarehouse) -> Tool {
    Tool::new(
        SAMPLE_ROWS_TOOL,
        "Get 3 sample rows from a warehouse table to understand actual data values, formats, and relationships. Use this before writing JOIN queries to verify foreign key values match across tables.",
        json!({
            "type": "object",
            "properties": {
                "dataset_id": {
                    "type": "string",
                    "description": "The dataset ID"
                },
                "table_id": {
                    "type": "string",
                    "description": "The table ID"
                }
            },
            "required": ["dataset_id", "table_id"]
        }),
        move |input| {
            let backend = backend.clone();
            Box::pin(async move {
                let dataset_id =
                    string_arg(&input, "dataset_id").ok_or("dataset_id and table_id are required")?;
                let table_id =
                    string_arg(&input, "table_id").ok_or("dataset_id and table_id are required")?;

                let sql = format!("SELECT * FROM `{dataset_id}.{table_id}` LIMIT 3");
                let result = backend
                    .execute_query(
                        &sql,
                        &QueryOptions {
                            timeout_ms: 10_000,
                            ..QueryOptions::default()
                        },
                    )
                    .await
                    .map_err(|err| format!("sample data: {err}"))?;

                let out = json!({
                    "table": format!("{dataset_id}.{table_id}"),
                    "columns": result.columns,
                    "sample": result.data,
                    "note": "These are sample rows only. Use these to understand data format and join key values.",
                });
                serde_json::to_string(&out).map_err(|err| err.to_string())
            })
        },
    )
}

fn execute_sql_tool(backend: SharedWarehouse) -> Tool {
    Tool::new(
        EXECUTE_SQL_TOOL,
        "Execute a SQL SELECT query on the warehouse and return the results. Only SELECT queries are allowed.",
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL SELECT query to execute"
                }
            },
            "required": ["sql"]
        }),
        move |input| {
            let backend = backend.clone();
            Box::pin(async move {
                let sql = string_arg(&input, "sql").ok_or("sql is required")?;
                let result = backend
                    .execute_query(&sql, &QueryOptions::default())
                    .await
                    .map_err(|err| format!("execute query: {err}"))?;

                let out = json!({
                    "row_count": result.data.len(),
                    "columns": result.columns,
                    "data": result.data,
                    "bytes_processed": result.total_bytes_processed,
                });
                serde_json::to_string(&out).map_err(|err| err.to_string())
            })
        },
    )
}
