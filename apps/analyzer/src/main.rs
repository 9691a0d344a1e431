mod analysis;
mod config;
mod errors;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::fields::FieldExtractor;
use crate::analysis::jobs::{JobRegistry, JobRetention};
use crate::analysis::name_resolver::{DenyList, NameResolver};
use crate::analysis::orchestrator::Analyzer;
use crate::analysis::recognizer;
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging; PDF parsers are noisy below error level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},lopdf=error,pdf_extract=error",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Analyzer v{}", env!("CARGO_PKG_VERSION"));

    // Load the language model once; nothing can be analyzed without it
    let recognizer = recognizer::load_shared(&config.ner_model_path).with_context(|| {
        format!(
            "cannot start without a language model (set NER_MODEL_PATH, currently '{}')",
            config.ner_model_path.display()
        )
    })?;
    info!("Recognizer ready (locale: {})", recognizer.locale());

    let deny_list = DenyList::with_extra(&config.extra_deny_tokens);
    let analyzer = Arc::new(Analyzer::new(
        NameResolver::new(recognizer, deny_list),
        FieldExtractor::new(),
        config.analysis_workers,
    ));
    info!("Analyzer ready ({} workers)", config.analysis_workers.max(1));

    // Build app state
    let state = AppState {
        config: config.clone(),
        analyzer,
        jobs: JobRegistry::new(JobRetention {
            max_age: chrono::Duration::seconds(i64::from(config.job_retention_secs)),
            max_stopped: config.max_finished_jobs,
        }),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the UI host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
