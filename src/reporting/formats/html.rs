// src/reporting/formats/html.rs
use std::collections::HashMap;
use std::path::Path;
use async_trait::async_trait;
use tracing::debug;

use crate::error::{FinderResult, FinderError};
use crate::reporting::format::{ReportFormat, ReportGenerator};
use crate::reporting::model::HarnessReport;
use crate::reporting::template::TemplateEngine;
use crate::utils::text::html_encode;

const REPORT_TEMPLATE: &str = include_str!("../templates/report.html");
const COMPONENT_TEMPLATE: &str = include_str!("../templates/component.html");
const CONTACT_ROW_TEMPLATE: &str = include_str!("../templates/contact_row.html");

/// HTML report generator
pub struct HtmlReportGenerator {
    template_engine: TemplateEngine,
}

impl Default for HtmlReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlReportGenerator {
    /// Create a generator with the built-in templates
    pub fn new() -> Self {
        let mut template_engine = TemplateEngine::new();
        template_engine.register_template("html_report", REPORT_TEMPLATE);
        template_engine.register_template("html_component", COMPONENT_TEMPLATE);
        template_engine.register_template("html_contact", CONTACT_ROW_TEMPLATE);
        Self { template_engine }
    }

    /// Create a generator with a custom template engine
    ///
    /// The engine must provide `html_report`, `html_component` and
    /// `html_contact` templates.
    pub fn new_with_template(template_engine: TemplateEngine) -> Self {
        Self { template_engine }
    }

    pub fn render(&self, report: &HarnessReport) -> FinderResult<String> {
        let components = report
            .components
            .iter()
            .map(|component| -> FinderResult<HashMap<String, String>> {
                let output = serde_json::to_string_pretty(&component.output)?;
                Ok(escaped(&[
                    ("name", component.name.clone()),
                    ("elapsed_seconds", format!("{:.3}", component.elapsed_seconds)),
                    ("output", output),
                ]))
            })
            .collect::<FinderResult<Vec<_>>>()?;

        let contacts: Vec<HashMap<String, String>> = report
            .contacts
            .iter()
            .map(|contact| {
                escaped(&[
                    ("org_ein", contact.org_ein.to_string()),
                    ("org_name", contact.org_name.clone()),
                    ("name", contact.name.clone()),
                    ("title", contact.title.clone()),
                    ("sources", contact.sources_joined()),
                    ("confidence", format!("{:.2}", contact.confidence)),
                    ("email", contact.email.clone().unwrap_or_default()),
                    ("phone", contact.phone.clone().unwrap_or_default()),
                ])
            })
            .collect();

        let summary = &report.summary;
        let mut variables = escaped(&[
            ("id", report.id.clone()),
            ("title", report.title.clone()),
            ("created_at", report.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            ("organizations", summary.organizations.to_string()),
            ("components_run", summary.components_run.to_string()),
            ("total_component_seconds", format!("{:.3}", summary.total_component_seconds)),
            ("contacts_found", summary.contacts_found.to_string()),
            ("average_confidence", format!("{:.2}", summary.average_confidence)),
        ]);

        // Sections hold markup built from already escaped values
        variables.insert("components".to_string(), self.template_engine.render_section("html_component", &components)?);
        variables.insert("contacts".to_string(), self.template_engine.render_section("html_contact", &contacts)?);

        self.template_engine.render("html_report", &variables)
    }
}

fn escaped(pairs: &[(&str, String)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), html_encode(value)))
        .collect()
}

#[async_trait]
impl ReportGenerator for HtmlReportGenerator {
    async fn generate(&self, report: &HarnessReport, output_path: &Path) -> FinderResult<()> {
        let html = self.render(report)?;

        debug!("Writing HTML report to {}", output_path.display());
        tokio::fs::write(output_path, html)
            .await
            .map_err(|e| FinderError::file(output_path, format!("Failed to write HTML report: {}", e)))?;

        Ok(())
    }

    fn supported_format(&self) -> ReportFormat {
        ReportFormat::HTML
    }
}
