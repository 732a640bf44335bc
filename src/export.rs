//! Writing a finished run to disk.
//!
//! Three files per run, named after the input:
//!
//! | File | Content |
//! |------|---------|
//! | `{stem}.txt` | report text |
//! | `{stem}.md` | report text |
//! | `{stem}_complete.md` | extracted data, a rule, then the report |
//!
//! Each file is written to a `.tmp` sibling and renamed into place, so a
//! reader never sees a half-written export.

use crate::error::DeckReportError;
use crate::output::ReportOutput;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where [`write_exports`] put each file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportPaths {
    pub txt: PathBuf,
    pub md: PathBuf,
    pub complete: PathBuf,
}

impl ExportPaths {
    pub fn for_stem(dir: &Path, stem: &str) -> Self {
        Self {
            txt: dir.join(format!("{stem}.txt")),
            md: dir.join(format!("{stem}.md")),
            complete: dir.join(format!("{stem}_complete.md")),
        }
    }
}

/// Write the plain, Markdown and composite exports of `output` into `dir`.
pub async fn write_exports(
    output: &ReportOutput,
    dir: impl AsRef<Path>,
    stem: &str,
) -> Result<ExportPaths, DeckReportError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DeckReportError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let paths = ExportPaths::for_stem(dir, stem);
    write_atomic(&paths.txt, &output.report.text).await?;
    write_atomic(&paths.md, &output.report.text).await?;
    write_atomic(&paths.complete, &output.composite_markdown).await?;

    info!("Exports written to {}", dir.display());
    Ok(paths)
}

async fn write_atomic(path: &Path, content: &str) -> Result<(), DeckReportError> {
    let write_err = |e: std::io::Error| DeckReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{composite_markdown, Report, ReportStats};
    use crate::stage::AnalysisStage;

    fn output() -> ReportOutput {
        ReportOutput {
            source_name: "q3.pptx".into(),
            report: Report {
                text: "The report.".into(),
                stage: AnalysisStage::Comprehensive,
            },
            combined_extraction: "Scores.".into(),
            composite_markdown: composite_markdown("Scores.", "The report."),
            initial_results: Vec::new(),
            final_results: Vec::new(),
            warnings: Vec::new(),
            stats: ReportStats::default(),
        }
    }

    #[tokio::test]
    async fn writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");

        let paths = write_exports(&output(), &out, "q3").await.unwrap();

        assert_eq!(paths.complete, out.join("q3_complete.md"));
        assert_eq!(std::fs::read_to_string(&paths.txt).unwrap(), "The report.");
        assert_eq!(std::fs::read_to_string(&paths.md).unwrap(), "The report.");
        let complete = std::fs::read_to_string(&paths.complete).unwrap();
        assert!(complete.starts_with("# EXTRACTED DATA\n\nScores."));
        assert!(complete.ends_with("# REPORT\n\nThe report."));
        assert!(!out.join("q3.md.tmp").exists());
    }

    #[tokio::test]
    async fn unwritable_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_exports(&output(), blocker.join("sub"), "q3")
            .await
            .unwrap_err();
        assert!(matches!(err, DeckReportError::OutputWriteFailed { .. }));
    }
}
