// src/reporting/format.rs
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::error::{FinderResult, FinderError};
use super::model::HarnessReport;

/// Report format enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    JSON,
    HTML,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format_to_extension(self))
    }
}

impl FromStr for ReportFormat {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        extension_to_format(s).ok_or_else(|| FinderError::InvalidInput(format!("Unknown report format: {}", s)))
    }
}

/// Report generator trait
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Generate a report in a specific format
    async fn generate(&self, report: &HarnessReport, output_path: &Path) -> FinderResult<()>;

    /// Get the supported format
    fn supported_format(&self) -> ReportFormat;
}

/// Convert report format to file extension
pub fn format_to_extension(format: &ReportFormat) -> &'static str {
    match format {
        ReportFormat::JSON => "json",
        ReportFormat::HTML => "html",
    }
}

/// Convert file extension to report format
pub fn extension_to_format(extension: &str) -> Option<ReportFormat> {
    match extension.to_lowercase().as_str() {
        "json" => Some(ReportFormat::JSON),
        "html" | "htm" => Some(ReportFormat::HTML),
        _ => None,
    }
}
