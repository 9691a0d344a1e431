//! Analysis orchestration. The only entry point callers use.
//!
//! `Analyzer::analyze` is synchronous and CPU-bound; async callers run it on
//! the blocking pool. `analyze_batch` fans documents out to a bounded set of
//! blocking workers and hands results back in input order.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::analysis::extractor::{extract_text, Document, ExtractionError};
use crate::analysis::fields::FieldExtractor;
use crate::analysis::keywords::KeywordScanner;
use crate::analysis::name_resolver::NameResolver;
use crate::analysis::scoring::relevance_score;
use crate::models::analysis::{AnalysisResult, BatchItem, DocumentFailure};

const ABORTED: &str = "analysis aborted unexpectedly";

/// Shared stop switch, checked between documents.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub succeeded: usize,
    pub failed: usize,
    /// Set when the run stopped early; unstarted documents are absent from `items`.
    pub cancelled: bool,
}

impl BatchReport {
    fn new(items: Vec<BatchItem>, cancelled: bool) -> Self {
        let succeeded = items.iter().filter(|i| i.result().is_some()).count();
        Self {
            failed: items.len() - succeeded,
            succeeded,
            items,
            cancelled,
        }
    }

    pub fn results(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.items.iter().filter_map(BatchItem::result)
    }
}

pub struct Analyzer {
    names: NameResolver,
    fields: FieldExtractor,
    workers: usize,
}

impl Analyzer {
    pub fn new(names: NameResolver, fields: FieldExtractor, workers: usize) -> Self {
        Self {
            names,
            fields,
            workers: workers.max(1),
        }
    }

    pub fn names(&self) -> &NameResolver {
        &self.names
    }

    /// Extracts and analyzes one document.
    pub fn analyze(
        &self,
        document: &Document,
        keywords: &KeywordScanner,
    ) -> Result<AnalysisResult, ExtractionError> {
        let text = extract_text(document)?;
        debug!("{}: extracted {} bytes of text", document.identifier, text.len());
        Ok(self.analyze_text(&document.identifier, &text, keywords))
    }

    /// Pure analysis of already-extracted text. Same inputs, same result.
    pub fn analyze_text(
        &self,
        identifier: &str,
        text: &str,
        keywords: &KeywordScanner,
    ) -> AnalysisResult {
        let scan = keywords.scan(text);
        let result = AnalysisResult {
            document: identifier.to_string(),
            name: self.names.resolve(text),
            email: self.fields.email(text),
            phone: self.fields.phone(text),
            relevance_score: relevance_score(&scan.counts),
            has_keyword_match: scan.has_any_match(),
            keyword_counts: scan.counts,
        };
        debug!(
            "{identifier}: name={} email={} phone={} score={:.2}",
            result.name.is_found(),
            result.email.is_found(),
            result.phone.is_found(),
            result.relevance_score
        );
        result
    }

    /// Never aborts on a bad document: extraction failures become
    /// `BatchItem::Failure` and the run moves on. `progress` receives the
    /// number of finished documents after each one completes.
    pub async fn analyze_batch(
        self: Arc<Self>,
        documents: Vec<Document>,
        keywords: Arc<KeywordScanner>,
        cancel: CancelFlag,
        progress: Option<mpsc::UnboundedSender<usize>>,
    ) -> BatchReport {
        let total = documents.len();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let finished = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        let mut started = Vec::with_capacity(total);
        let mut cancelled = false;

        info!("Batch started: {total} documents, {} workers", self.workers);

        for (index, document) in documents.into_iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            started.push(document.identifier.clone());
            let analyzer = self.clone();
            let keywords = keywords.clone();
            let progress = progress.clone();
            let finished = finished.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let item = analyzer.analyze_item(&document, &keywords);
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(tx) = progress {
                    let _ = tx.send(done);
                }
                (index, item)
            });
        }

        let mut finished_items = Vec::with_capacity(started.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => finished_items.push(entry),
                Err(e) => error!("Batch worker did not complete: {e}"),
            }
        }

        let report = BatchReport::new(in_input_order(started, finished_items), cancelled);
        info!(
            "Batch finished: {} succeeded, {} failed{}",
            report.succeeded,
            report.failed,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    fn analyze_item(&self, document: &Document, keywords: &KeywordScanner) -> BatchItem {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.analyze(document, keywords)));
        match outcome {
            Ok(Ok(result)) => BatchItem::Success(result),
            Ok(Err(e)) => {
                warn!("Skipping {}: {}", document.identifier, e.cause);
                BatchItem::Failure(DocumentFailure {
                    document: document.identifier.clone(),
                    error: e.to_string(),
                })
            }
            Err(_) => {
                error!("Analysis of {} panicked", document.identifier);
                BatchItem::Failure(DocumentFailure {
                    document: document.identifier.clone(),
                    error: ABORTED.to_string(),
                })
            }
        }
    }
}

/// One item per started document, in input order. A document whose worker
/// never reported back is recorded as a failure.
fn in_input_order(started: Vec<String>, finished: Vec<(usize, BatchItem)>) -> Vec<BatchItem> {
    let mut slots: Vec<Option<BatchItem>> = started.iter().map(|_| None).collect();
    for (index, item) in finished {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(item);
        }
    }
    slots
        .into_iter()
        .zip(started)
        .map(|(slot, document)| {
            slot.unwrap_or_else(|| {
                BatchItem::Failure(DocumentFailure {
                    document,
                    error: ABORTED.to_string(),
                })
            })
        })
        .collect()
}

/// PDF files directly inside `folder`, sorted by file name so batch order does
/// not depend on the filesystem.
pub fn collect_folder(folder: &Path) -> Result<Vec<Document>, walkdir::Error> {
    let mut documents = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let is_pdf = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if entry.file_type().is_file() && is_pdf {
            documents.push(Document::from_path(entry.path()));
        }
    }
    Ok(documents)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::analysis::name_resolver::DenyList;
    use crate::analysis::recognizer::fixtures::lexicon;

    pub fn analyzer(workers: usize) -> Arc<Analyzer> {
        let names = NameResolver::new(Arc::new(lexicon()), DenyList::default());
        Arc::new(Analyzer::new(names, FieldExtractor::new(), workers))
    }
}
