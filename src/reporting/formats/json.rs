// src/reporting/formats/json.rs
use std::path::Path;
use async_trait::async_trait;

use crate::error::{FinderResult, FinderError};
use crate::reporting::format::{ReportFormat, ReportGenerator};
use crate::reporting::model::HarnessReport;

/// JSON report generator
#[derive(Debug, Default)]
pub struct JsonReportGenerator;

impl JsonReportGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportGenerator for JsonReportGenerator {
    async fn generate(&self, report: &HarnessReport, output_path: &Path) -> FinderResult<()> {
        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(output_path, json)
            .await
            .map_err(|e| FinderError::file(output_path, e))?;
        Ok(())
    }

    fn supported_format(&self) -> ReportFormat {
        ReportFormat::JSON
    }
}
