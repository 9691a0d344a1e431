//! Keyword occurrence counting. Matches are case-insensitive whole words.

use regex::Regex;

use crate::models::analysis::KeywordCount;

/// The user's keywords, trimmed, empties dropped, input order kept.
/// Duplicates are allowed and are counted once per entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    pub fn from_list<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        )
    }

    /// Parses the comma-separated form, e.g. `"React, Docker, Kubernetes"`.
    pub fn parse(raw: &str) -> Self {
        Self::from_list(raw.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Turns a user keyword into a pattern that matches it literally, ignoring
/// case. `\b` is only asserted on edges that are word characters; edges such
/// as the `++` of `C++` are checked by `KeywordPattern::is_isolated`.
pub fn sanitize_keyword(keyword: &str) -> String {
    let escaped = regex::escape(keyword);
    let lead = if keyword.chars().next().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    let trail = if keyword.chars().next_back().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    format!("(?i){lead}{escaped}{trail}")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Per-document keyword counts, in keyword input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordScan {
    pub counts: Vec<KeywordCount>,
}

impl KeywordScan {
    pub fn has_any_match(&self) -> bool {
        self.counts.iter().any(|c| c.count > 0)
    }
}

/// A compiled keyword plus the punctuation on its edges, if any.
#[derive(Debug, Clone)]
struct KeywordPattern {
    keyword: String,
    regex: Regex,
    lead: Option<char>,
    trail: Option<char>,
}

impl KeywordPattern {
    fn new(keyword: &str) -> Result<Self, regex::Error> {
        let punct = |c: Option<char>| c.filter(|c| !is_word_char(*c));
        Ok(Self {
            keyword: keyword.to_string(),
            regex: Regex::new(&sanitize_keyword(keyword))?,
            lead: punct(keyword.chars().next()),
            trail: punct(keyword.chars().next_back()),
        })
    }

    /// A punctuation edge must not touch a word character or a repeat of
    /// itself, so `C++` is not found in `C++x` or `C+++`.
    fn is_isolated(&self, text: &str, start: usize, end: usize) -> bool {
        let clear = |edge: Option<char>, neighbour: Option<char>| match (edge, neighbour) {
            (Some(edge), Some(n)) => !is_word_char(n) && n != edge,
            _ => true,
        };
        clear(self.lead, text[..start].chars().next_back())
            && clear(self.trail, text[end..].chars().next())
    }

    fn count(&self, text: &str) -> usize {
        let mut count = 0;
        let mut pos = 0;
        while let Some(m) = self.regex.find_at(text, pos) {
            if self.is_isolated(text, m.start(), m.end()) {
                count += 1;
                pos = m.end();
            } else {
                // Retry one character later; a valid match may overlap the rejected one.
                pos = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
            if pos >= text.len() {
                break;
            }
        }
        count
    }
}

/// Patterns compiled once per keyword set and reused across documents.
#[derive(Debug, Clone)]
pub struct KeywordScanner {
    patterns: Vec<KeywordPattern>,
}

impl KeywordScanner {
    pub fn new(keywords: &KeywordSet) -> Result<Self, regex::Error> {
        let patterns = keywords
            .iter()
            .map(KeywordPattern::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn scan(&self, text: &str) -> KeywordScan {
        KeywordScan {
            counts: self
                .patterns
                .iter()
                .map(|p| KeywordCount {
                    keyword: p.keyword.clone(),
                    count: p.count(text),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(text: &str, keyword: &str) -> usize {
        let scanner = KeywordScanner::new(&KeywordSet::from_list([keyword])).unwrap();
        scanner.scan(text).counts[0].count
    }

    #[test]
    fn test_parse_trims_and_drops_empty_entries() {
        let set = KeywordSet::parse(" React,  ,Docker ,Kubernetes,");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["React", "Docker", "Kubernetes"]);
    }

    #[test]
    fn test_parse_blank_input_is_empty() {
        assert!(KeywordSet::parse(" , ,").is_empty());
    }

    #[test]
    fn test_case_insensitive_whole_word() {
        assert_eq!(count("React developer", "react"), 1);
        assert_eq!(count("Reacted", "react"), 0);
        assert_eq!(count("REACT, react.js and React", "React"), 3);
    }

    #[test]
    fn test_keyword_inside_longer_token_is_not_counted() {
        assert_eq!(count("Golang and Go", "Go"), 1);
    }

    #[test]
    fn test_pattern_metacharacters_are_literal() {
        assert_eq!(count("C++ and C# developer", "C++"), 1);
        assert_eq!(count("CXX developer", "C++"), 0);
        assert_eq!(count("Node.js, Nodexjs", "Node.js"), 1);
        assert_eq!(count("ASP.NET Core and .NET 8", ".NET"), 1);
        assert_eq!(count("a (b) c", "(b)"), 1);
    }

    #[test]
    fn test_punctuation_edged_keyword_inside_longer_token_is_not_counted() {
        let keywords = KeywordSet::from_list(["C++", ".NET"]);
        let scan = KeywordScanner::new(&keywords).unwrap().scan("C++x ASP.NET C+++");
        assert_eq!(scan.counts[0].count, 0);
        assert_eq!(scan.counts[1].count, 0);
        assert!(!scan.has_any_match());
    }

    #[test]
    fn test_punctuation_edged_keyword_next_to_separators() {
        assert_eq!(count("(C++), C++; C++", "C++"), 3);
        assert_eq!(count("C++/C++", "C++"), 2);
    }

    #[test]
    fn test_sanitize_keyword_escapes_and_bounds() {
        assert_eq!(sanitize_keyword("react"), r"(?i)\breact\b");
        assert_eq!(sanitize_keyword("C++"), r"(?i)\bC\+\+");
        assert_eq!(sanitize_keyword(".NET"), r"(?i)\.NET\b");
    }

    #[test]
    fn test_duplicates_are_counted_per_entry() {
        let keywords = KeywordSet::from_list(["Docker", "docker"]);
        let scan = KeywordScanner::new(&keywords).unwrap().scan("docker docker");
        assert_eq!(scan.counts.len(), 2);
        assert!(scan.counts.iter().all(|c| c.count == 2));
    }

    #[test]
    fn test_counts_keep_input_order_and_any_match() {
        let keywords = KeywordSet::from_list(["Kubernetes", "Docker"]);
        let scan = KeywordScanner::new(&keywords).unwrap().scan("Docker everywhere");
        assert_eq!(scan.counts[0].keyword, "Kubernetes");
        assert_eq!(scan.counts[0].count, 0);
        assert_eq!(scan.counts[1].count, 1);
        assert!(scan.has_any_match());
    }

    #[test]
    fn test_empty_text_has_no_match() {
        let keywords = KeywordSet::from_list(["Rust"]);
        let scan = KeywordScanner::new(&keywords).unwrap().scan("");
        assert!(!scan.has_any_match());
    }
}
