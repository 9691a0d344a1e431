use std::fmt;

use serde::{Deserialize, Serialize};

/// Display form of a field that the pipeline looked for and did not find.
pub const NOT_FOUND_LABEL: &str = "Not found";

/// An extracted field. `NotFound` is a valid outcome, never an error, and is
/// kept distinct from an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Found(String),
    NotFound,
}

impl FieldValue {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            FieldValue::Found(v) => Some(v.as_str()),
            FieldValue::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => FieldValue::Found(v),
            None => FieldValue::NotFound,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_deref().unwrap_or(NOT_FOUND_LABEL))
    }
}

/// Occurrences of one user keyword. Order follows the user's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

/// Per-document analysis output. Built once by the analyzer, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub document: String,
    pub name: FieldValue,
    pub email: FieldValue,
    pub phone: FieldValue,
    pub keyword_counts: Vec<KeywordCount>,
    /// 0–100, rounded to two decimals.
    pub relevance_score: f64,
    pub has_keyword_match: bool,
}

/// A document whose text could not be extracted during a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document: String,
    pub error: String,
}

/// One entry of a batch report, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchItem {
    Success(AnalysisResult),
    Failure(DocumentFailure),
}

impl BatchItem {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            BatchItem::Success(r) => Some(r),
            BatchItem::Failure(_) => None,
        }
    }

    pub fn document(&self) -> &str {
        match self {
            BatchItem::Success(r) => &r.document,
            BatchItem::Failure(f) => &f.document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_serializes_with_status_tag() {
        let found = serde_json::to_string(&FieldValue::Found("Jean Dupont".into())).unwrap();
        assert_eq!(found, r#"{"status":"found","value":"Jean Dupont"}"#);

        let missing = serde_json::to_string(&FieldValue::NotFound).unwrap();
        assert_eq!(missing, r#"{"status":"not_found"}"#);
    }

    #[test]
    fn test_field_value_display_uses_sentinel_label() {
        assert_eq!(FieldValue::NotFound.to_string(), "Not found");
        assert_eq!(FieldValue::Found("a@b.io".into()).to_string(), "a@b.io");
    }

    #[test]
    fn test_field_value_from_option() {
        assert_eq!(FieldValue::from(None), FieldValue::NotFound);
        assert!(FieldValue::from(Some("x".to_string())).is_found());
    }

    #[test]
    fn test_batch_item_failure_has_no_result() {
        let item = BatchItem::Failure(DocumentFailure {
            document: "broken.pdf".into(),
            error: "not a PDF".into(),
        });
        assert!(item.result().is_none());
        assert_eq!(item.document(), "broken.pdf");
    }
}
