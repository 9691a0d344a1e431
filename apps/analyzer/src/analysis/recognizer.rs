//! Named-entity recognition. The recognizer is the one expensive, read-only resource shared by
//! every analysis.
//!
//! `NameResolver` depends on the `EntityRecognizer` trait, never on a concrete
//! model, so tests can hand it a stub. The production backend is
//! `LexiconRecognizer`: a French-locale gazetteer loaded from a JSON model file
//! once per process.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLabel {
    Person,
    Other,
}

/// A span reported by the recognizer. Offsets are byte offsets into the text
/// that was passed to `recognize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
}

/// Implementations must be reentrant: one instance serves all analyses.
pub trait EntityRecognizer: Send + Sync {
    /// Entities in emission order (document order for the lexicon backend).
    fn recognize(&self, text: &str) -> Vec<Entity>;

    /// Locale tag reported on the health endpoint.
    fn locale(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("language model not found at '{path}': {source}")]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("language model at '{path}' is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("language model at '{path}' defines no given names")]
    Empty { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct LexiconModel {
    locale: String,
    given_names: Vec<String>,
    #[serde(default)]
    particles: Vec<String>,
}

/// Gazetteer-based person recognizer.
///
/// Within each line, runs of two or more capitalized tokens (optionally joined
/// by lowercase surname particles such as `de` or `van`) are emitted as
/// entities. A run is labelled `Person` when one of its tokens is a known given
/// name, `Other` otherwise.
#[derive(Debug)]
pub struct LexiconRecognizer {
    locale: String,
    given_names: HashSet<String>,
    particles: HashSet<String>,
}

impl LexiconRecognizer {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Missing {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            ModelError::Malformed { source, .. } => ModelError::Malformed {
                path: path.to_path_buf(),
                source,
            },
            ModelError::Empty { .. } => ModelError::Empty {
                path: path.to_path_buf(),
            },
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let model: LexiconModel =
            serde_json::from_str(raw).map_err(|source| ModelError::Malformed {
                path: PathBuf::new(),
                source,
            })?;
        if model.given_names.is_empty() {
            return Err(ModelError::Empty {
                path: PathBuf::new(),
            });
        }
        Ok(Self {
            locale: model.locale,
            given_names: model.given_names.iter().map(|n| fold(n)).collect(),
            particles: model.particles.iter().map(|p| p.to_lowercase()).collect(),
        })
    }

    fn is_given_name(&self, token: &str) -> bool {
        token
            .split('-')
            .any(|part| self.given_names.contains(&fold(part)))
    }

    fn recognize_line(&self, line: &str, line_offset: usize, out: &mut Vec<Entity>) {
        let tokens = tokenize(line);
        let mut i = 0;
        while i < tokens.len() {
            if !tokens[i].capitalized {
                i += 1;
                continue;
            }
            let first = i;
            let mut last = i;
            let mut j = i;
            while !tokens[j].closes_run && j + 1 < tokens.len() {
                let next = &tokens[j + 1];
                if next.capitalized {
                    j += 1;
                    last = j;
                } else if self.particles.contains(&next.text.to_lowercase())
                    && !next.closes_run
                    && tokens.get(j + 2).is_some_and(|t| t.capitalized)
                {
                    j += 2;
                    last = j;
                } else {
                    break;
                }
            }

            let run = &tokens[first..=last];
            let capitalized = run.iter().filter(|t| t.capitalized).count();
            if capitalized >= 2 {
                let start = run[0].start;
                let end = run[run.len() - 1].end;
                let label = if run.iter().any(|t| t.capitalized && self.is_given_name(t.text)) {
                    EntityLabel::Person
                } else {
                    EntityLabel::Other
                };
                out.push(Entity {
                    text: line[start..end].to_string(),
                    label,
                    start: line_offset + start,
                    end: line_offset + end,
                });
            }
            i = last + 1;
        }
    }
}

impl EntityRecognizer for LexiconRecognizer {
    fn recognize(&self, text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();
        let mut offset = 0;
        for line in text.split('\n') {
            self.recognize_line(line, offset, &mut entities);
            offset += line.len() + 1;
        }
        entities
    }

    fn locale(&self) -> &str {
        &self.locale
    }
}

static SHARED_MODEL: OnceLock<Arc<LexiconRecognizer>> = OnceLock::new();

/// Loads the process-wide recognizer. The first successful call wins; later
/// calls return the same instance without touching the filesystem.
pub fn load_shared(path: &Path) -> Result<Arc<dyn EntityRecognizer>, ModelError> {
    if let Some(model) = SHARED_MODEL.get() {
        return Ok(model.clone());
    }
    let loaded = LexiconRecognizer::load(path)?;
    info!(
        "Loaded {} language model from {} ({} given names)",
        loaded.locale,
        path.display(),
        loaded.given_names.len()
    );
    let model = SHARED_MODEL.get_or_init(|| Arc::new(loaded));
    Ok(model.clone())
}

struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
    capitalized: bool,
    /// Token was followed by punctuation that ends a name (",", ";", ":", "|").
    closes_run: bool,
}

fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut cursor = 0;
    for raw in line.split_whitespace() {
        let raw_start = cursor + line[cursor..].find(raw).unwrap_or(0);
        cursor = raw_start + raw.len();

        let leading = raw.len() - raw.trim_start_matches(is_edge_punct).len();
        let trimmed = raw.trim_matches(is_edge_punct);
        if trimmed.is_empty() {
            if let Some(prev) = tokens.last_mut() {
                prev.closes_run = true;
            }
            continue;
        }
        let start = raw_start + leading;
        let trailing = &raw[leading + trimmed.len()..];
        tokens.push(Token {
            text: trimmed,
            start,
            end: start + trimmed.len(),
            capitalized: is_capitalized(trimmed),
            closes_run: trailing.chars().any(|c| matches!(c, ',' | ';' | ':' | '|' | '/')),
        });
    }
    tokens
}

fn is_edge_punct(c: char) -> bool {
    !c.is_alphanumeric() && c != '\'' && c != '-'
}

fn is_capitalized(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(char::is_uppercase) && chars.all(|c| c.is_alphabetic() || c == '-' || c == '\'')
}

/// Lowercases and strips the French diacritics so "Élodie" matches "elodie".
fn fold(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'ç' => 'c',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ÿ' => 'y',
            other => other,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const MODEL_JSON: &str = include_str!("../../data/person_lexicon_fr.json");

    pub fn lexicon() -> LexiconRecognizer {
        LexiconRecognizer::from_json(MODEL_JSON).unwrap()
    }

    /// Returns a fixed entity list regardless of input.
    pub struct StubRecognizer(pub Vec<(&'static str, EntityLabel)>);

    impl EntityRecognizer for StubRecognizer {
        fn recognize(&self, _text: &str) -> Vec<Entity> {
            self.0
                .iter()
                .map(|(text, label)| Entity {
                    text: text.to_string(),
                    label: *label,
                    start: 0,
                    end: text.len(),
                })
                .collect()
        }

        fn locale(&self) -> &str {
            "test"
        }
    }
}
