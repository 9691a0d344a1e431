use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_KEYWORDS: &str = "React, Docker, Kubernetes";
const DEFAULT_MODEL_PATH: &str = "data/person_lexicon_fr.json";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub ner_model_path: PathBuf,
    /// Folder analysis is only allowed below this directory. Unset disables it.
    pub documents_root: Option<PathBuf>,
    /// CSV exports to disk land below this directory. Unset disables them.
    pub export_dir: Option<PathBuf>,
    pub analysis_workers: usize,
    /// Used when a request carries no keyword field at all.
    pub default_keywords: String,
    pub extra_deny_tokens: Vec<String>,
    pub max_upload_bytes: usize,
    /// Seconds a stopped job stays queryable before eviction.
    pub job_retention_secs: u32,
    pub max_finished_jobs: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            ner_model_path: std::env::var("NER_MODEL_PATH")
                .unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string())
                .into(),
            documents_root: optional_env("DOCUMENTS_ROOT").map(PathBuf::from),
            export_dir: optional_env("EXPORT_DIR").map(PathBuf::from),
            analysis_workers: parse_env("ANALYSIS_WORKERS", 1)?,
            default_keywords: std::env::var("DEFAULT_KEYWORDS")
                .unwrap_or_else(|_| DEFAULT_KEYWORDS.to_string()),
            extra_deny_tokens: optional_env("NAME_DENY_LIST")
                .map(|raw| raw.split(',').map(|t| t.trim().to_string()).collect())
                .unwrap_or_default(),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            job_retention_secs: parse_env("JOB_RETENTION_SECS", 3600)?,
            max_finished_jobs: parse_env("MAX_FINISHED_JOBS", 100)?,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            port: 0,
            rust_log: "debug".to_string(),
            ner_model_path: DEFAULT_MODEL_PATH.into(),
            documents_root: None,
            export_dir: None,
            analysis_workers: 2,
            default_keywords: DEFAULT_KEYWORDS.to_string(),
            extra_deny_tokens: vec![],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            job_retention_secs: 60,
            max_finished_jobs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: usize = parse_env("CV_ANALYZER_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("CV_ANALYZER_TEST_BAD_PORT", "eighty");
        let err = parse_env::<u16>("CV_ANALYZER_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(err.to_string().contains("CV_ANALYZER_TEST_BAD_PORT"));
    }
}
