pub mod cache;
pub mod fs;
pub mod http;
pub mod rate_limit;
pub mod robots;
pub mod text;

pub use cache::ResultCache;
pub use http::HttpClient;
pub use rate_limit::{RateLimiter, Pacing, SessionRotator, retry_with_backoff, jittered_delay};
pub use fs::write_atomic;
