//! Delivery of finished batch reports

use crate::services::batch_orchestrator::BatchReport;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receives each finished report exactly once
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: &BatchReport) -> hts_common::Result<()>;
}

/// Writes every report as pretty JSON into one directory.
///
/// Email delivery to the requestor is not performed; the address is logged
/// with the written path.
pub struct JsonReportSink {
    dir: PathBuf,
}

impl JsonReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<invoice>-<batch id>.json`, invoice reduced to filename-safe characters
    pub fn file_name(report: &BatchReport) -> String {
        let invoice: String = report
            .invoice_number
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let invoice = if invoice.is_empty() { "batch".to_string() } else { invoice };
        format!("{}-{}.json", invoice, report.batch_id)
    }
}

#[async_trait]
impl ReportSink for JsonReportSink {
    async fn deliver(&self, report: &BatchReport) -> hts_common::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(Self::file_name(report));
        let body = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&path, body).await?;

        info!(
            batch_id = %report.batch_id,
            requestor = report.requestor.as_deref().unwrap_or("<none>"),
            path = %path.display(),
            rows = report.rows.len(),
            "Batch report written"
        );
        Ok(())
    }
}
