//! Structured run report for downstream tool consumption.
//!
//! Written as JSON next to the output so pipelines can pick up the run
//! statistics without parsing logs.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::annotate::AnnotationSummary;
use crate::output::OutputFormat;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tool version
    pub version: String,
    /// Timestamp of run (RFC 3339)
    pub timestamp: String,
    /// `barcode` or `gmc`
    pub command: String,
    pub input: String,
    pub output: OutputInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pedigree: Option<String>,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputInfo {
    pub path: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_records: usize,
    pub records_annotated: usize,
    pub records_without_gene: usize,
    pub distinct_genes: usize,
    pub samples: usize,
    pub samples_with_family: usize,
    pub samples_without_family: usize,
    pub records_passing_filter: usize,
}

impl From<&AnnotationSummary> for Statistics {
    fn from(s: &AnnotationSummary) -> Self {
        Statistics {
            total_records: s.total_records,
            records_annotated: s.records_annotated,
            records_without_gene: s.records_without_gene,
            distinct_genes: s.distinct_genes,
            samples: s.samples,
            samples_with_family: s.samples_with_family,
            samples_without_family: s.samples_without_family,
            records_passing_filter: s.records_passing_filter,
        }
    }
}

impl RunReport {
    pub fn new(command: &str, input: &Path, output: &Path, summary: &AnnotationSummary) -> Self {
        let timestamp = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        RunReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            command: command.to_string(),
            input: input.display().to_string(),
            output: OutputInfo {
                path: output.display().to_string(),
                format: OutputFormat::from_path(output).name().to_string(),
            },
            pedigree: summary.pedigree.as_ref().map(|p| p.display().to_string()),
            statistics: Statistics::from(summary),
        }
    }

    /// For `out.vcf` this is `out_report.json`; a `.gz` suffix is dropped first.
    pub fn path_for(output_path: &Path) -> PathBuf {
        let name = output_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        let stem = Path::new(name)
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy();
        output_path.with_file_name(format!("{stem}_report.json"))
    }

    pub fn write(&self, output_path: &Path) -> std::io::Result<PathBuf> {
        let report_path = Self::path_for(output_path);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        std::fs::write(&report_path, json)?;
        tracing::info!("Wrote run report to {}", report_path.display());

        Ok(report_path)
    }
}
