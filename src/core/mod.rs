pub mod organization;

pub use organization::{Organization, OrganizationProcessor, normalize_name};
