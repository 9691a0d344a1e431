use std::sync::Arc;

use crate::analysis::jobs::JobRegistry;
use crate::analysis::orchestrator::Analyzer;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Holds the process-wide recognizer; shared read-only by every request.
    pub analyzer: Arc<Analyzer>,
    pub jobs: JobRegistry,
}
