//! Display and export forms of analysis results: table rows, the plain-text
//! report, and CSV.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::analysis::{AnalysisResult, BatchItem};

/// Appended to the candidate name when any keyword matched.
pub const MATCH_MARKER: &str = " ✅";

pub const CSV_HEADER: [&str; 6] = [
    "File Name",
    "Candidate Name",
    "Email",
    "Phone",
    "Keyword Counts",
    "Score",
];

/// One table row, every cell already in display form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub file_name: String,
    pub candidate_name: String,
    pub email: String,
    pub phone: String,
    pub keyword_counts: String,
    pub score: String,
}

impl From<&AnalysisResult> for ResultRow {
    fn from(result: &AnalysisResult) -> Self {
        let mut candidate_name = result.name.to_string();
        if result.has_keyword_match {
            candidate_name.push_str(MATCH_MARKER);
        }
        let keyword_counts = result
            .keyword_counts
            .iter()
            .map(|c| format!("{}: {}", c.keyword, c.count))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            file_name: result.document.clone(),
            candidate_name,
            email: result.email.to_string(),
            phone: result.phone.to_string(),
            keyword_counts,
            score: format!("{:.2}%", result.relevance_score),
        }
    }
}

impl ResultRow {
    fn cells(&self) -> [&str; 6] {
        [
            &self.file_name,
            &self.candidate_name,
            &self.email,
            &self.phone,
            &self.keyword_counts,
            &self.score,
        ]
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not move export into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub fn write_csv<'a, W, I>(writer: W, results: I) -> Result<(), ExportError>
where
    W: Write,
    I: IntoIterator<Item = &'a AnalysisResult>,
{
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;
    for result in results {
        csv.write_record(ResultRow::from(result).cells())?;
    }
    csv.flush()?;
    Ok(())
}

pub fn to_csv_string<'a, I>(results: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = &'a AnalysisResult>,
{
    let mut buffer = Vec::new();
    write_csv(&mut buffer, results)?;
    String::from_utf8(buffer).map_err(|e| ExportError::Io(std::io::Error::other(e)))
}

/// Writes the whole export to a temp file next to `path`, then renames it into
/// place. Readers never see a partial file. Missing parent directories are
/// created.
pub fn export_csv_atomic<'a, I>(path: &Path, results: I) -> Result<(), ExportError>
where
    I: IntoIterator<Item = &'a AnalysisResult>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    write_csv(tmp.as_file_mut(), results)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// The classic text report: one block per file, separated by a blank line.
pub fn render_text_report(items: &[BatchItem]) -> String {
    let mut lines = Vec::new();
    for item in items {
        lines.push(format!("File: {}", item.document()));
        match item {
            BatchItem::Success(result) => {
                let row = ResultRow::from(result);
                lines.push(format!("Candidate Name: {}", row.candidate_name));
                lines.push(format!("Email: {}", row.email));
                lines.push(format!("Phone: {}", row.phone));
                lines.push("Keyword counts:".to_string());
                for c in &result.keyword_counts {
                    lines.push(format!("  '{}': {} times", c.keyword, c.count));
                }
                lines.push(format!("Score: {}", row.score));
            }
            BatchItem::Failure(failure) => {
                lines.push(format!("Error: {}", failure.error));
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{DocumentFailure, FieldValue, KeywordCount};

    fn result(name: Option<&str>, counts: &[(&str, usize)], score: f64) -> AnalysisResult {
        let keyword_counts: Vec<KeywordCount> = counts
            .iter()
            .map(|(k, c)| KeywordCount {
                keyword: k.to_string(),
                count: *c,
            })
            .collect();
        AnalysisResult {
            document: "cv.pdf".to_string(),
            name: name.map(String::from).into(),
            email: FieldValue::Found("jean@example.fr".into()),
            phone: FieldValue::NotFound,
            has_keyword_match: keyword_counts.iter().any(|c| c.count > 0),
            keyword_counts,
            relevance_score: score,
        }
    }

    #[test]
    fn test_row_marks_keyword_match() {
        let row = ResultRow::from(&result(Some("Jean Dupont"), &[("React", 2), ("Docker", 0)], 50.0));
        assert_eq!(row.candidate_name, "Jean Dupont ✅");
        assert_eq!(row.keyword_counts, "React: 2, Docker: 0");
        assert_eq!(row.score, "50.00%");
        assert_eq!(row.phone, "Not found");
    }

    #[test]
    fn test_row_without_match_has_no_marker() {
        let row = ResultRow::from(&result(None, &[("React", 0)], 0.0));
        assert_eq!(row.candidate_name, "Not found");
        assert_eq!(row.score, "0.00%");
    }

    #[test]
    fn test_csv_has_header_and_one_row_per_result() {
        let results = vec![
            result(Some("Jean Dupont"), &[("Go", 1)], 100.0),
            result(None, &[("Go", 0)], 0.0),
        ];
        let csv = to_csv_string(&results).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "File Name,Candidate Name,Email,Phone,Keyword Counts,Score");
        assert_eq!(lines[1], "cv.pdf,Jean Dupont ✅,jean@example.fr,Not found,Go: 1,100.00%");
    }

    #[test]
    fn test_csv_quotes_cells_with_commas() {
        let results = vec![result(Some("Jean Dupont"), &[("Go", 1), ("Rust", 0)], 50.0)];
        let csv = to_csv_string(&results).unwrap();
        assert!(csv.contains("\"Go: 1, Rust: 0\""));
    }

    #[test]
    fn test_atomic_export_writes_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let results = vec![result(Some("Jean Dupont"), &[("Go", 1)], 100.0)];

        export_csv_atomic(&path, &results).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, to_csv_string(&results).unwrap());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_atomic_export_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("june").join("run.csv");
        let results = vec![result(Some("Jean Dupont"), &[("Go", 1)], 100.0)];

        export_csv_atomic(&path, &results).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, to_csv_string(&results).unwrap());
    }

    #[test]
    fn test_text_report_matches_classic_layout() {
        let items = vec![
            BatchItem::Success(result(Some("Jean Dupont"), &[("React", 2)], 100.0)),
            BatchItem::Failure(DocumentFailure {
                document: "broken.pdf".into(),
                error: "not a PDF".into(),
            }),
        ];
        let report = render_text_report(&items);
        assert!(report.starts_with("File: cv.pdf\nCandidate Name: Jean Dupont ✅\n"));
        assert!(report.contains("Keyword counts:\n  'React': 2 times\n"));
        assert!(report.contains("File: broken.pdf\nError: not a PDF\n"));
    }
}
