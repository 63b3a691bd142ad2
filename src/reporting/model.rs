// src/reporting/model.rs
use std::collections::BTreeSet;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::integration::ContactRecord;

/// Complete harness report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessReport {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub components: Vec<ComponentReport>,
    pub contacts: Vec<ContactRecord>,
}

/// Report summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub organizations: usize,
    pub components_run: usize,
    pub total_component_seconds: f64,
    pub contacts_found: usize,
    pub average_confidence: f64,
}

/// Output and timing of a single component run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub name: String,
    pub elapsed_seconds: f64,
    pub output: serde_json::Value,
}

impl HarnessReport {
    pub fn new(title: impl Into<String>, components: Vec<ComponentReport>, contacts: Vec<ContactRecord>) -> Self {
        let summary = ReportSummary::from_parts(&components, &contacts);
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            created_at: Utc::now(),
            summary,
            components,
            contacts,
        }
    }
}

impl ReportSummary {
    pub fn from_parts(components: &[ComponentReport], contacts: &[ContactRecord]) -> Self {
        let organizations = contacts.iter().map(|c| c.org_ein).collect::<BTreeSet<_>>().len();
        let average_confidence = if contacts.is_empty() {
            0.0
        } else {
            contacts.iter().map(|c| c.confidence).sum::<f64>() / contacts.len() as f64
        };

        Self {
            organizations,
            components_run: components.len(),
            total_component_seconds: components.iter().map(|c| c.elapsed_seconds).sum(),
            contacts_found: contacts.len(),
            average_confidence,
        }
    }
}
