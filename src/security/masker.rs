use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::types::Row;

static EMAIL_COL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)email").expect("regex"));
static PHONE_COL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)phone").expect("regex"));
static SSN_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ssn|social_security").expect("regex"));
static CREDIT_CARD_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)credit_card|card_number").expect("regex"));
static FULL_MASK_COL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)password|secret|token|api_key|access_key|private_key").expect("regex")
});

/// Column-aware redaction of result rows. Masking is stable: re-masking an
/// already-masked row yields the same row.
#[derive(Debug, Clone)]
pub struct DataMasker {
    sensitive_columns: Vec<String>,
}

impl DataMasker {
    pub fn new(sensitive_columns: &[String]) -> Self {
        Self {
            sensitive_columns: sensitive_columns.iter().map(|c| c.to_lowercase()).collect(),
        }
    }

    pub fn mask_rows(&self, rows: &[Row]) -> Vec<Row> {
        rows.iter().map(|row| self.mask_row(row)).collect()
    }

    fn mask_row(&self, row: &Row) -> Row {
        let mut masked = Row::new();
        for (col, val) in row {
            if self.is_sensitive(col) {
                masked.insert(col.clone(), Value::String(self.mask_value(col, val)));
            } else {
                masked.insert(col.clone(), val.clone());
            }
        }
        masked
    }

    fn is_sensitive(&self, col: &str) -> bool {
        let lower = col.to_lowercase();
        if self.sensitive_columns.iter().any(|s| lower.contains(s)) {
            return true;
        }
        EMAIL_COL.is_match(col)
            || PHONE_COL.is_match(col)
            || SSN_COL.is_match(col)
            || CREDIT_CARD_COL.is_match(col)
            || FULL_MASK_COL.is_match(col)
    }

    fn mask_value(&self, col: &str, val: &Value) -> String {
        let text = match val {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let lower = col.to_lowercase();
        if EMAIL_COL.is_match(&lower) {
            mask_email(&text)
        } else if PHONE_COL.is_match(&lower) {
            mask_phone(&text)
        } else if SSN_COL.is_match(&lower) {
            "***-**-****".to_string()
        } else if CREDIT_CARD_COL.is_match(&lower) {
            mask_credit_card(&text)
        } else {
            "***".to_string()
        }
    }
}

// "john.doe@example.com" -> "jo***@***.com"
fn mask_email(email: &str) -> String {
    let mut parts = email.splitn(2, '@');
    let (local, domain) = match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) if !domain.is_empty() => (local, domain),
        _ => return "***".to_string(),
    };

    let visible: String = local.chars().take(2).collect();
    let ext = domain.rsplit('.').next().unwrap_or("");
    format!("{visible}***@***.{ext}")
}

// Any phone -> "***-***-NNNN" (last 4 digits of the digits-only view).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return "***-***-****".to_string();
    }
    format!("***-***-{}", &digits[digits.len() - 4..])
}

// "4111111111111111" -> "****-****-****-1111"
fn mask_credit_card(cc: &str) -> String {
    let digits: String = cc.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return "****-****-****-****".to_string();
    }
    format!("****-****-****-{}", &digits[digits.len() - 4..])
}
