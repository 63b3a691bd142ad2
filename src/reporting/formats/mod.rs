pub mod json;
pub mod html;

pub use json::JsonReportGenerator;
pub use html::HtmlReportGenerator;
