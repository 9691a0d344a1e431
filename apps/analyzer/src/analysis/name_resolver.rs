//! Candidate-name inference: recognizer output first, then a line heuristic.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use crate::analysis::recognizer::{EntityLabel, EntityRecognizer};
use crate::models::analysis::FieldValue;

/// Tokens the recognizer is known to tag as people on technical résumés.
pub const DEFAULT_DENY_LIST: &[&str] = &[
    "linkedin",
    "github",
    "kubernetes",
    "docker",
    "azure",
    "html",
    "css",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    EntityRecognition,
    LineHeuristic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCandidate {
    pub text: String,
    pub source: CandidateSource,
    pub is_plausible: bool,
}

impl NameCandidate {
    fn new(text: &str, source: CandidateSource) -> Self {
        Self {
            text: text.to_string(),
            source,
            is_plausible: has_name_shape(text),
        }
    }
}

/// Lowercase tokens that disqualify a name candidate.
#[derive(Debug, Clone)]
pub struct DenyList {
    tokens: HashSet<String>,
}

impl Default for DenyList {
    fn default() -> Self {
        Self::with_extra(std::iter::empty::<&str>())
    }
}

impl DenyList {
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = DEFAULT_DENY_LIST
            .iter()
            .map(|t| t.to_string())
            .chain(
                extra
                    .into_iter()
                    .map(|t| t.as_ref().trim().to_lowercase())
                    .filter(|t| !t.is_empty()),
            )
            .collect();
        Self { tokens }
    }

    /// True when the whole candidate, or any word in it, is deny-listed.
    pub fn denies(&self, candidate: &str) -> bool {
        let lowered = candidate.trim().to_lowercase();
        self.tokens.contains(&lowered) || lowered.split_whitespace().any(|w| self.tokens.contains(w))
    }
}

/// "Firstname Lastname": two ASCII words, each an uppercase letter followed by
/// one or more lowercase letters, separated by a single space.
pub fn has_name_shape(candidate: &str) -> bool {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE
        .get_or_init(|| Regex::new(r"^[A-Z][a-z]+ [A-Z][a-z]+$").expect("name shape pattern is valid"))
        .is_match(candidate)
}

#[derive(Clone)]
pub struct NameResolver {
    recognizer: Arc<dyn EntityRecognizer>,
    deny_list: DenyList,
}

impl NameResolver {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>, deny_list: DenyList) -> Self {
        Self {
            recognizer,
            deny_list,
        }
    }

    pub fn recognizer(&self) -> &dyn EntityRecognizer {
        self.recognizer.as_ref()
    }

    pub fn resolve(&self, text: &str) -> FieldValue {
        let found = self
            .entity_stage(text)
            .or_else(|| self.line_stage(text));
        match found {
            Some(candidate) => {
                debug!("Resolved name via {:?}", candidate.source);
                FieldValue::Found(candidate.text)
            }
            None => FieldValue::NotFound,
        }
    }

    /// First person entity, in emission order, that survives the deny-list and
    /// the shape filter.
    fn entity_stage(&self, text: &str) -> Option<NameCandidate> {
        self.recognizer
            .recognize(text)
            .into_iter()
            .filter(|e| e.label == EntityLabel::Person && !self.deny_list.denies(&e.text))
            .map(|e| NameCandidate::new(&e.text, CandidateSource::EntityRecognition))
            .find(|c| c.is_plausible)
    }

    fn line_stage(&self, text: &str) -> Option<NameCandidate> {
        text.split('\n')
            .map(str::trim)
            .map(|line| NameCandidate::new(line, CandidateSource::LineHeuristic))
            .find(|c| c.is_plausible && !self.deny_list.denies(&c.text))
    }
}
