mod patterns;
mod verify;

pub use patterns::{EmailPatternGenerator, EmailCandidate, EmailLookup, PATTERN_WEIGHTS};
pub use verify::{MailVerifier, DnsMailVerifier, SmtpProbe};

#[cfg(test)]
pub use verify::MockMailVerifier;
