//! Recovers a SQL statement from free-form model output.
//!
//! Strategies, in order, first non-empty wins:
//! 1. A ```sql fenced block.
//! 2. Any fenced block whose body starts with SELECT or WITH.
//! 3. A multi-line CTE (`WITH name AS (...)`).
//! 4. A multi-line SELECT ending at a LIMIT, semicolon or end of text.
//! 5. A single-line `SELECT ... FROM ...` as last resort.
//!
//! The result may still not be valid SQL; the SQL validator is the only gate
//! before execution.

use std::sync::LazyLock;

use regex::Regex;

static MULTILINE_CTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(WITH\s+\w+\s+AS\s*\(.+?(?:LIMIT\s+\d+|;\s*$|\z))").expect("regex")
});
static SELECT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(SELECT\s+.+?FROM\s+.+?(?:LIMIT\s+\d+|;\s*$|\z))").expect("regex")
});
static SINGLE_LINE_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(SELECT\s+\S.+?\bFROM\b\s+\S+)").expect("regex"));

/// Extracts SQL from model text. Empty string means "no SQL found".
pub fn extract_sql(text: &str) -> String {
    // Strategy 1: ```sql fenced block, case-insensitive tag.
    let lower = text.to_lowercase();
    if let Some(idx) = lower.find("```sql") {
        let mut body = &text[idx + "```sql".len()..];
        if let Some(stripped) = body.strip_prefix('\n') {
            body = stripped;
        }
        if let Some(end) = body.find("```") {
            let sql = body[..end].trim();
            if !sql.is_empty() {
                return strip_terminator(sql);
            }
        }
    }

    // Strategy 2: any fenced block whose content starts with SELECT or WITH,
    // ignoring a leading language-tag line.
    let parts: Vec<&str> = text.split("```").collect();
    let mut i = 1;
    while i < parts.len() {
        let mut candidate = parts[i].trim();
        if let Some(nl) = candidate.find('\n') {
            let first_line = candidate[..nl].trim().to_uppercase();
            if !first_line.contains("SELECT") && !first_line.contains("WITH") {
                candidate = candidate[nl..].trim();
            }
        }
        let upper = candidate.to_uppercase();
        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            return strip_terminator(candidate);
        }
        i += 2;
    }

    // Strategy 3a: proper CTE.
    if let Some(m) = MULTILINE_CTE.find(text) {
        return strip_terminator(m.as_str().trim());
    }

    // Strategy 3b: multi-line SELECT; sanity-check it still contains FROM.
    if let Some(m) = SELECT_BLOCK.find(text) {
        let candidate = strip_terminator(m.as_str().trim());
        if candidate.to_uppercase().contains(" FROM ") {
            return candidate;
        }
    }

    // Strategy 4: single-line SELECT as last resort.
    if let Some(m) = SINGLE_LINE_SELECT.find(text) {
        return strip_terminator(m.as_str().trim());
    }

    String::new()
}

fn strip_terminator(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim().to_string()
}
