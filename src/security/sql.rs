use std::sync::LazyLock;

use regex::Regex;

// Stacked statements, file I/O, timing probes, comment splices and
// tautologies. `UNION ALL SELECT` is a legitimate combine and stays allowed;
// bare `UNION SELECT` is treated as injection.
static SQL_DANGEROUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i);\s*DROP\s+",
        r"(?i);\s*DELETE\s+",
        r"(?i);\s*INSERT\s+",
        r"(?i);\s*UPDATE\s+",
        r"(?i);\s*ALTER\s+",
        r"(?i);\s*CREATE\s+",
        r"(?i);\s*TRUNCATE\s+",
        r"(?i);\s*EXEC\s*\(?",
        r"(?i);\s*EXECUTE\s+",
        r"(?i)\bUNION\s+SELECT\b",
        r"(?i)\bINTO\s+OUTFILE\b",
        r"(?i)\bINTO\s+DUMPFILE\b",
        r"(?i)\bLOAD\s+DATA\b",
        r"(?i)\bLOAD_FILE\s*\(",
        r"(?i)\bBENCHMARK\s*\(",
        r"(?i)\bSLEEP\s*\(",
        r"(?i)\bWAITFOR\s+DELAY\b",
        r"'.*--",
        r";\s*--",
        r"/\*.*?\*/",
        r"(?i)\bor\s+1\s*=\s*1\b",
        r"(?i)\band\s+1\s*=\s*1\b",
        r"(?i)\bor\s+'1'\s*=\s*'1'",
        r"(?i)\band\s+'1'\s*=\s*'1'",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("sql pattern"))
    .collect()
});

/// Validates generated SQL before execution. This is the only gate between
/// SQL extraction and the warehouse.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlValidator;

impl SqlValidator {
    pub fn new() -> Self {
        SqlValidator
    }

    /// Returns an empty string when the SQL is acceptable, or a diagnostic
    /// naming the rule that blocked it.
    pub fn validate(&self, sql: &str) -> String {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return "SQL cannot be empty".to_string();
        }

        let upper = trimmed.to_uppercase();
        if !upper.starts_with("SELECT") && !upper.starts_with("WITH") {
            return "only SELECT queries are allowed".to_string();
        }

        for pattern in SQL_DANGEROUS_PATTERNS.iter() {
            if pattern.is_match(sql) {
                return format!("SQL injection pattern detected: {}", pattern.as_str());
            }
        }

        String::new()
    }
}
