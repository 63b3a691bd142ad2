mod format;
mod generator;
mod model;
mod template;
pub mod formats;

pub use format::{ReportFormat, ReportGenerator, format_to_extension, extension_to_format};
pub use generator::ReportManager;
pub use model::{HarnessReport, ReportSummary, ComponentReport};
pub use template::TemplateEngine;
pub use formats::{HtmlReportGenerator, JsonReportGenerator};
