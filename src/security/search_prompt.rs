use std::sync::LazyLock;

use regex::Regex;

// Identifier classes, checked in declaration order. A prompt is actionable
// when at least one pattern of any class matches.
static IDENTIFIER_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    let class = |name: &'static str, patterns: &[&str]| {
        (
            name,
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("identifier pattern"))
                .collect::<Vec<_>>(),
        )
    };
    vec![
        class(
            "order_id",
            &[
                r"(?i)\border[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\border[-_]?id\s+[\w\-]+",
                r"(?i)\border\s+(?:number|#)?[:=]?\s*[\w\-]+",
            ],
        ),
        class(
            "transaction_id",
            &[
                r"(?i)\btransaction[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\btxn[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\btransaction\s+(?:number|#)?[:=]?\s*[\w\-]+",
            ],
        ),
        class(
            "user_id",
            &[
                r"(?i)\buser[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\buid\s*[:=]\s*[\w\-]+",
                r"(?i)\bcustomer[-_]?id\s*[:=]\s*[\w\-]+",
            ],
        ),
        class(
            "booking_id",
            &[
                r"(?i)\bbooking[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\breservation[-_]?id\s*[:=]\s*[\w\-]+",
            ],
        ),
        class(
            "invoice_id",
            &[
                r"(?i)\binvoice[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\binvoice\s+(?:number|#)?[:=]?\s*[\w\-]+",
            ],
        ),
        class(
            "payment_id",
            &[
                r"(?i)\bpayment[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\bpayment[-_]?ref\s*[:=]\s*[\w\-]+",
            ],
        ),
        class(
            "session_id",
            &[
                r"(?i)\bsession[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\bsession\s+(?:id|token)?[:=]?\s*[\w\-]+",
            ],
        ),
        class(
            "request_id",
            &[
                r"(?i)\brequest[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\bcorrelation[-_]?id\s*[:=]\s*[\w\-]+",
                r"(?i)\btrace[-_]?id\s*[:=]\s*[\w\-]+",
            ],
        ),
        class(
            "email",
            &[
                r"(?i)\bemail\s*[:=]\s*[\w.\-]+@[\w.\-]+\.\w+",
                // Unanchored on purpose: an email-like substring anywhere
                // makes the prompt actionable.
                r"[\w.\-]+@[\w.\-]+\.\w+",
            ],
        ),
        class(
            "phone",
            &[
                r"(?i)\bphone\s*[:=]\s*[\d\-+()\s]+",
                r"(?i)\bmobile\s*[:=]\s*[\d\-+()\s]+",
            ],
        ),
        class(
            "ip_address",
            &[
                r"(?i)\bip\s*[:=]\s*\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}",
                r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}",
            ],
        ),
        class(
            "time_range",
            &[
                r"(?i)\blast\s+\d+\s+(?:seconds?|minutes?|hours?|days?)",
                r"(?i)\blast\s+(?:seconds?|minutes?|hours?|days?)",
                r"(?i)\bfrom\s+\w+",
                r"(?i)\bsince\s+\w+",
                r"(?i)\bbetween\s+.+?\s+and\s+",
                r"(?i)\bpast\s+\d+\s+(?:seconds?|minutes?|hours?|days?)",
                r"(?i)\bpast\s+(?:seconds?|minutes?|hours?|days?)",
                r"(?i)\btoday\b",
                r"(?i)\byesterday\b",
                r"(?i)\bnow\s*-\s*\d+[hm]\b",
                r#"(?i)\bgte?\s*[:=]\s*["']?now"#,
            ],
        ),
        class(
            "service_name",
            &[
                r"(?i)\bservice\s*[:=]\s*\w+",
                r"(?i)\bapp\s*[:=]\s*\w+",
                r"(?i)\bapplication\s*[:=]\s*\w+",
                r"(?i)\bmicroservice\s*[:=]\s*\w+",
            ],
        ),
        class(
            "error_code",
            &[
                r"(?i)\berror[-_]?code\s*[:=]\s*[\w\-]+",
                r"(?i)\bstatus[-_]?code\s*[:=]\s*\d{3}",
                r"(?i)\bhttp\s+\d{3}",
                r"(?i)\berr\s*[:=]\s*[\w\-]+",
            ],
        ),
        class(
            "url_path",
            &[
                r"/[a-zA-Z0-9_/\-]+",
                r"(?i)\bpath\s*[:=]\s*/[a-zA-Z0-9_/\-]+",
                r"(?i)\bendpoint\s*[:=]\s*/[a-zA-Z0-9_/\-]+",
            ],
        ),
        class(
            "http_method",
            &[r"\b(GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS)\b"],
        ),
        class(
            "status",
            &[
                r"(?i)\bstatus\s*[:=]\s*(success|failed|error|pending|timeout)",
                r"(?i)\bstate\s*[:=]\s*(active|inactive|blocked)",
            ],
        ),
    ]
});

// Prompts matching any of these are rejected outright, identifiers or not.
static VAGUE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bfind\s+all\s+errors?\b",
        r"(?i)\bshow\s+me\s+all\s+errors?\b",
        r"(?i)\blist\s+all\s+errors?\b",
        r"(?i)\bget\s+all\s+(logs|errors)\b",
        r"(?i)\ball\s+(logs|errors?)\b",
        r"(?i)\bshow\s+(logs|errors?)\s*(?:for\s+all|without|for\s+\w+\s*$)",
        r"(?i)\bdisplay\s+all\s+",
        r"(?i)\bwhat\s+are\s+the\s+errors?\b",
        r"(?i)\bany\s+errors?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("vague pattern"))
    .collect()
});

/// Outcome of search-prompt validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchValidation {
    pub valid: bool,
    /// Matched identifier class, empty on failure.
    pub identifier_class: String,
    /// Diagnostic, empty on success.
    pub message: String,
}

/// Requires search prompts to carry at least one concrete identifier so the
/// agent never runs an unbounded log sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchPromptValidator;

impl SearchPromptValidator {
    pub fn new() -> Self {
        SearchPromptValidator
    }

    pub fn validate(&self, prompt: &str) -> SearchValidation {
        for vague in VAGUE_PATTERNS.iter() {
            if vague.is_match(prompt) {
                return SearchValidation {
                    valid: false,
                    identifier_class: String::new(),
                    message: "prompt is too vague - please include specific identifiers \
                              (order ID, user ID, time range, etc.)"
                        .to_string(),
                };
            }
        }

        for (class, patterns) in IDENTIFIER_PATTERNS.iter() {
            if patterns.iter().any(|p| p.is_match(prompt)) {
                return SearchValidation {
                    valid: true,
                    identifier_class: (*class).to_string(),
                    message: String::new(),
                };
            }
        }

        let examples = [
            "order_id: 12345",
            "user_id: abc123",
            "email: user@example.com",
            "last 1 hour",
            "status: error",
        ];
        SearchValidation {
            valid: false,
            identifier_class: String::new(),
            message: format!(
                "prompt must include a specific identifier. Examples: {}",
                examples.join(", ")
            ),
        }
    }
}
