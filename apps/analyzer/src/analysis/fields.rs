//! Contact-field extraction by pattern search.
//!
//! Both searches return the first match scanning left to right. The phone
//! pattern is deliberately permissive: dates or reference numbers made of
//! 2–3 digit groups can match too.

use regex::Regex;

use crate::models::analysis::FieldValue;

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}";

/// Optional `+CC`, optional `(area)`, then a lead group followed by at least two
/// 2–3 digit groups ending on a digit boundary. Separators are space, tab, dot
/// or dash; never a newline.
const PHONE_PATTERN: &str =
    r"(?:\+\d{1,3}[ \t.\-]?)?(?:\(\d{1,4}\)[ \t.\-]?)?\d{1,4}(?:[ \t.\-]?\d{2,3}){2,}\b";

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    email: Regex,
    phone: Regex,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self {
            email: Regex::new(EMAIL_PATTERN).expect("email pattern is valid"),
            phone: Regex::new(PHONE_PATTERN).expect("phone pattern is valid"),
        }
    }

    pub fn email(&self, text: &str) -> FieldValue {
        first_match(&self.email, text)
    }

    pub fn phone(&self, text: &str) -> FieldValue {
        first_match(&self.phone, text)
    }
}

fn first_match(pattern: &Regex, text: &str) -> FieldValue {
    pattern
        .find(text)
        .map(|m| m.as_str().trim().to_string())
        .into()
}
