/// Checks prompts for sensitive PII keywords before they reach the model.
#[derive(Debug, Clone)]
pub struct PiiDetector {
    keywords: Vec<String>,
}

impl PiiDetector {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// First matching keyword, or `None` when the text is clean.
    pub fn detect(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|kw| lower.contains(kw.as_str()))
            .map(|kw| kw.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PiiDetector {
        PiiDetector::new(&[
            "password".to_string(),
            "ssn".to_string(),
            "credit card".to_string(),
        ])
    }

    #[test]
    fn reports_first_matching_keyword() {
        assert_eq!(
            detector().detect("show me the PASSWORD column"),
            Some("password")
        );
        assert_eq!(detector().detect("list credit card numbers"), Some("credit card"));
    }

    #[test]
    fn clean_text_passes() {
        assert_eq!(detector().detect("show top users by order count"), None);
    }

    #[test]
    fn matching_is_case_insensitive_both_ways() {
        let det = PiiDetector::new(&["SSN".to_string()]);
        assert_eq!(det.detect("what is the ssn of user 5"), Some("ssn"));
    }
}
