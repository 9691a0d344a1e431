//! Axum route handlers for the Analysis API.

use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::extractor::Document;
use crate::analysis::jobs::JobSnapshot;
use crate::analysis::keywords::{KeywordScanner, KeywordSet};
use crate::analysis::orchestrator::{collect_folder, BatchReport, CancelFlag};
use crate::analysis::report::{export_csv_atomic, render_text_report, to_csv_string, ResultRow};
use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Keywords as a list or as the comma-separated entry-box string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum KeywordInput {
    List(Vec<String>),
    Csv(String),
}

impl From<KeywordInput> for KeywordSet {
    fn from(input: KeywordInput) -> Self {
        match input {
            KeywordInput::List(list) => KeywordSet::from_list(list),
            KeywordInput::Csv(raw) => KeywordSet::parse(&raw),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    pub folder: PathBuf,
    pub keywords: Option<KeywordInput>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub result: AnalysisResult,
    pub row: ResultRow,
}

#[derive(Debug, Serialize)]
pub struct JobCreatedResponse {
    pub job_id: Uuid,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub results: Vec<AnalysisResult>,
    /// Relative to `EXPORT_DIR`. Without it the CSV is returned in the body.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub path: PathBuf,
    pub rows: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
///
/// Multipart: one `file` part and an optional `keywords` part.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let upload = read_upload(multipart).await?;
    let keywords = compile_keywords(upload.keywords, &state.config.default_keywords)?;
    let document = match upload.documents.len() {
        1 => upload.documents.into_iter().next().ok_or_else(no_documents)?,
        0 => return Err(no_documents()),
        n => {
            return Err(AppError::Validation(format!(
                "Expected one file, received {n}; use /api/v1/analyze/batch"
            )))
        }
    };

    let analyzer = state.analyzer.clone();
    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&document, &keywords))
        .await
        .map_err(|e| AppError::Internal(anyhow!("analysis task failed: {e}")))??;

    info!("Analyzed {} (score {:.2})", result.document, result.relevance_score);
    let row = ResultRow::from(&result);
    Ok(Json(AnalyzeResponse { result, row }))
}

/// POST /api/v1/analyze/batch
///
/// Multipart: any number of `file` parts, processed in file-name order.
pub async fn handle_analyze_batch(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;
    let keywords = compile_keywords(upload.keywords, &state.config.default_keywords)?;
    let mut documents = upload.documents;
    if documents.is_empty() {
        return Err(no_documents());
    }
    documents.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    let report = state
        .analyzer
        .clone()
        .analyze_batch(documents, keywords, CancelFlag::default(), None)
        .await;
    Ok(render_report(report, query.format))
}

/// POST /api/v1/analyze/folder
///
/// Analyzes every PDF directly inside a folder below `DOCUMENTS_ROOT`.
pub async fn handle_analyze_folder(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    Json(request): Json<FolderRequest>,
) -> Result<Response, AppError> {
    let keywords = compile_keywords(request.keywords.map(Into::into), &state.config.default_keywords)?;
    let documents = folder_documents(&state, &request.folder).await?;

    let report = state
        .analyzer
        .clone()
        .analyze_batch(documents, keywords, CancelFlag::default(), None)
        .await;
    Ok(render_report(report, query.format))
}

/// POST /api/v1/jobs
///
/// Same input as the folder endpoint, but runs in the background.
pub async fn handle_start_job(
    State(state): State<AppState>,
    Json(request): Json<FolderRequest>,
) -> Result<(StatusCode, Json<JobCreatedResponse>), AppError> {
    let keywords = compile_keywords(request.keywords.map(Into::into), &state.config.default_keywords)?;
    let documents = folder_documents(&state, &request.folder).await?;
    let total = documents.len();

    let job_id = state
        .jobs
        .start(state.analyzer.clone(), documents, keywords)
        .await;
    Ok((StatusCode::ACCEPTED, Json(JobCreatedResponse { job_id, total })))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, AppError> {
    state
        .jobs
        .snapshot(job_id)
        .await
        .map(Json)
        .ok_or_else(|| job_not_found(job_id))
}

/// DELETE /api/v1/jobs/:id
///
/// Stops the job before its next document; already-finished results are kept.
pub async fn handle_cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, AppError> {
    state
        .jobs
        .cancel(job_id)
        .await
        .map(Json)
        .ok_or_else(|| job_not_found(job_id))
}

/// GET /api/v1/jobs/:id/export
pub async fn handle_export_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let snapshot = state
        .jobs
        .snapshot(job_id)
        .await
        .ok_or_else(|| job_not_found(job_id))?;
    let report = snapshot
        .report
        .ok_or_else(|| AppError::UnprocessableEntity(format!("Job {job_id} is still running")))?;
    let csv = to_csv_string(report.results())?;
    Ok(csv_response(csv, &format!("cv-analysis-{job_id}.csv")))
}

/// POST /api/v1/export
///
/// Returns the CSV, or writes it atomically below `EXPORT_DIR` when `path` is set.
pub async fn handle_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, AppError> {
    let Some(relative) = request.path else {
        let csv = to_csv_string(&request.results)?;
        return Ok(csv_response(csv, "cv-analysis.csv"));
    };

    let root = state.config.export_dir.as_deref().ok_or_else(|| {
        AppError::Validation("File export is disabled: EXPORT_DIR is not set".to_string())
    })?;
    let target = resolve_export_path(root, &relative)?;
    let rows = request.results.len();
    let results = request.results;
    let written = target.clone();
    tokio::task::spawn_blocking(move || export_csv_atomic(&written, &results))
        .await
        .map_err(|e| AppError::Internal(anyhow!("export task failed: {e}")))??;

    info!("Exported {rows} rows to {}", target.display());
    Ok(Json(ExportResponse { path: relative, rows }).into_response())
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

struct Upload {
    documents: Vec<Document>,
    keywords: Option<KeywordSet>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut upload = Upload {
        documents: Vec::new(),
        keywords: None,
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "keywords" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable keywords field: {e}")))?;
                upload.keywords = Some(KeywordSet::parse(&raw));
            }
            "file" | "files" => {
                let file_name = field
                    .file_name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("document-{}.pdf", upload.documents.len() + 1));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable file '{file_name}': {e}")))?;
                upload.documents.push(Document::from_bytes(file_name, bytes));
            }
            _ => {}
        }
    }
    Ok(upload)
}

/// `None` means the caller sent no keyword field: fall back to the defaults.
/// A field that trims down to nothing is a usage error.
fn compile_keywords(
    supplied: Option<KeywordSet>,
    defaults: &str,
) -> Result<Arc<KeywordScanner>, AppError> {
    let keywords = supplied.unwrap_or_else(|| KeywordSet::parse(defaults));
    if keywords.is_empty() {
        return Err(AppError::Usage(
            "Please enter at least one keyword.".to_string(),
        ));
    }
    let scanner = KeywordScanner::new(&keywords)
        .map_err(|e| AppError::Validation(format!("Keyword cannot be matched: {e}")))?;
    debug!("Compiled {} keyword patterns", keywords.len());
    Ok(Arc::new(scanner))
}

async fn folder_documents(state: &AppState, requested: &FsPath) -> Result<Vec<Document>, AppError> {
    let root = state.config.documents_root.clone().ok_or_else(|| {
        AppError::Validation("Folder analysis is disabled: DOCUMENTS_ROOT is not set".to_string())
    })?;
    let requested = requested.to_path_buf();
    // Path resolution and the directory listing hit the filesystem.
    tokio::task::spawn_blocking(move || list_folder(&root, &requested))
        .await
        .map_err(|e| AppError::Internal(anyhow!("spawn_blocking failed listing folder: {e}")))?
}

fn list_folder(root: &FsPath, requested: &FsPath) -> Result<Vec<Document>, AppError> {
    let folder = resolve_folder(root, requested)?;
    let documents = collect_folder(&folder)
        .map_err(|e| AppError::Internal(anyhow!("cannot list {}: {e}", folder.display())))?;
    if documents.is_empty() {
        return Err(AppError::Usage(
            "No PDF files found in the selected folder.".to_string(),
        ));
    }
    Ok(documents)
}

fn resolve_folder(root: &FsPath, requested: &FsPath) -> Result<PathBuf, AppError> {
    let root = root
        .canonicalize()
        .map_err(|e| AppError::Internal(anyhow!("DOCUMENTS_ROOT is unusable: {e}")))?;
    let folder = root
        .join(requested)
        .canonicalize()
        .map_err(|_| AppError::NotFound(format!("Folder '{}' not found", requested.display())))?;
    if !folder.starts_with(&root) || !folder.is_dir() {
        return Err(AppError::Validation(format!(
            "'{}' is not a folder inside DOCUMENTS_ROOT",
            requested.display()
        )));
    }
    Ok(folder)
}

fn resolve_export_path(root: &FsPath, relative: &FsPath) -> Result<PathBuf, AppError> {
    let is_plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !is_plain || relative.file_name().is_none() {
        return Err(AppError::Validation(format!(
            "Export path '{}' must be a relative file path without '..'",
            relative.display()
        )));
    }
    Ok(root.join(relative))
}

fn render_report(report: BatchReport, format: ReportFormat) -> Response {
    match format {
        ReportFormat::Json => Json(report).into_response(),
        ReportFormat::Text => render_text_report(&report.items).into_response(),
    }
}

fn csv_response(csv: String, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        csv,
    )
        .into_response()
}

fn no_documents() -> AppError {
    AppError::Usage("No PDF file was provided.".to_string())
}

fn job_not_found(job_id: Uuid) -> AppError {
    AppError::NotFound(format!("Job {job_id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keyword_field_uses_defaults() {
        let scanner = compile_keywords(None, "React, Docker").unwrap();
        let scan = scanner.scan("react docker");
        assert_eq!(scan.counts.len(), 2);
    }

    #[test]
    fn test_blank_keyword_field_is_usage_error() {
        let err = compile_keywords(Some(KeywordSet::parse(" , ")), "React").unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));
    }

    #[test]
    fn test_keyword_input_accepts_list_or_string() {
        let list: KeywordInput = serde_json::from_str(r#"["Go", " Rust "]"#).unwrap();
        let csv: KeywordInput = serde_json::from_str(r#""Go, Rust""#).unwrap();
        assert_eq!(KeywordSet::from(list), KeywordSet::from(csv));
    }

    #[test]
    fn test_export_path_rejects_traversal() {
        let root = FsPath::new("/srv/exports");
        assert!(resolve_export_path(root, FsPath::new("../etc/passwd")).is_err());
        assert!(resolve_export_path(root, FsPath::new("/tmp/x.csv")).is_err());
        assert_eq!(
            resolve_export_path(root, FsPath::new("june/run.csv")).unwrap(),
            PathBuf::from("/srv/exports/june/run.csv")
        );
    }

    #[test]
    fn test_folder_outside_root_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let err = resolve_folder(root.path(), outside.path()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_missing_folder_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let err = resolve_folder(root.path(), FsPath::new("nope")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
