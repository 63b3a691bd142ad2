// src/reporting/generator.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, debug};

use crate::error::{FinderResult, FinderError};
use super::format::{ReportFormat, ReportGenerator, format_to_extension};
use super::formats::{HtmlReportGenerator, JsonReportGenerator};
use super::model::HarnessReport;

/// Report generation manager
pub struct ReportManager {
    generators: HashMap<ReportFormat, Box<dyn ReportGenerator>>,
}

impl Default for ReportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportManager {
    /// Create a manager with the HTML and JSON generators registered
    pub fn new() -> Self {
        let mut manager = Self { generators: HashMap::new() };
        manager.register_generator(Box::new(JsonReportGenerator::new()));
        manager.register_generator(Box::new(HtmlReportGenerator::new()));
        manager
    }

    /// Register a new report generator
    pub fn register_generator(&mut self, generator: Box<dyn ReportGenerator>) {
        let format = generator.supported_format();
        debug!("Registering report generator for format: {:?}", format);
        self.generators.insert(format, generator);
    }

    /// Generate a report in a specific format at `output_path`
    pub async fn generate_report(&self, report: &HarnessReport, format: ReportFormat, output_path: &Path) -> FinderResult<()> {
        let generator = self
            .generators
            .get(&format)
            .ok_or_else(|| FinderError::Unsupported(format!("No generator found for format {:?}", format)))?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FinderError::file(parent, e))?;
        }

        info!("Generating {:?} report at {}", format, output_path.display());
        generator.generate(report, output_path).await
    }

    /// Generate a report in several formats next to `base_path`, one extension each
    pub async fn generate_multi_format(&self, report: &HarnessReport, base_path: &Path, formats: &[ReportFormat]) -> FinderResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for format in formats {
            let path = base_path.with_extension(format_to_extension(format));
            self.generate_report(report, *format, &path).await?;
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_multi_format() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out").join("test_results.html");
        let report = HarnessReport::new("Run", Vec::new(), Vec::new());

        let paths = ReportManager::new()
            .generate_multi_format(&report, &base, &[ReportFormat::HTML, ReportFormat::JSON])
            .await
            .unwrap();

        assert_eq!(paths, vec![base.clone(), base.with_extension("json")]);
        assert!(paths.iter().all(|p| p.exists()));
    }
}
