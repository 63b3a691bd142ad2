// src/reporting/template.rs
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{FinderResult, FinderError};

/// Placeholder engine substituting `{{ key }}` markers
///
/// Substitution is a single pass over the template, so text inserted for one
/// placeholder is never scanned for further markers. Unknown keys render as
/// an empty string.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    templates: HashMap<String, String>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template with a name
    pub fn register_template(&mut self, name: &str, template: &str) {
        self.templates.insert(name.to_string(), template.to_string());
        debug!("Registered template: {}", name);
    }

    /// Load a template from a file
    pub async fn load_template(&mut self, name: &str, path: &Path) -> FinderResult<()> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FinderError::file(path, format!("Failed to read template file: {}", e)))?;

        self.register_template(name, &content);
        Ok(())
    }

    /// Render a registered template with the provided variables
    pub fn render(&self, template_name: &str, variables: &HashMap<String, String>) -> FinderResult<String> {
        let template = self
            .templates
            .get(template_name)
            .ok_or_else(|| FinderError::InvalidInput(format!("Template not found: {}", template_name)))?;

        Ok(substitute(template, variables))
    }

    /// Render a section of a template for each item in a collection
    pub fn render_section(&self, template_name: &str, items: &[HashMap<String, String>]) -> FinderResult<String> {
        let mut result = String::new();
        for item in items {
            result.push_str(&self.render(template_name, item)?);
        }
        Ok(result)
    }
}

fn substitute(template: &str, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = variables.get(key) {
                    output.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}
