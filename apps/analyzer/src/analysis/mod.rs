// Résumé analysis pipeline.
// Text extraction → name resolution, contact fields, keyword scan → relevance score.
// Handlers and jobs only ever go through `orchestrator::Analyzer`.

pub mod extractor;
pub mod fields;
pub mod handlers;
pub mod jobs;
pub mod keywords;
pub mod name_resolver;
pub mod orchestrator;
pub mod recognizer;
pub mod report;
pub mod scoring;
