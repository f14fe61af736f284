//! Checker abstraction for tracked external artifacts.
//!
//! A checker knows how to discover the latest released version for one
//! kind of upstream source. Records select their checker through the
//! `type` tag in their checker data; the registry resolves that tag to a
//! registered implementation.

mod html;
mod registry;

pub use html::{ConfigError, HTML_CHECKER_KIND, HtmlChecker, HtmlCheckerData};
pub use registry::CheckerRegistry;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use crate::record::ExternalRecord;

/// Terminal outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A new version was discovered, validated and installed on the record.
    UpdateFound,
    /// The resolved version matches the record's current one.
    UpToDate,
    /// The page did not yield a version/URL pair; the record is untouched.
    NoMatch,
    /// The resolved download URL could not be validated; the record is
    /// marked broken.
    Broken,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::UpdateFound => write!(f, "new version found"),
            CheckOutcome::UpToDate => write!(f, "up to date"),
            CheckOutcome::NoMatch => write!(f, "no version found on page"),
            CheckOutcome::Broken => write!(f, "download URL is broken"),
        }
    }
}

/// Trait for version checkers.
///
/// Implementations perform one check per call: fetch whatever the record
/// points at, extract the latest version, validate it, and mutate the
/// record exactly once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Checker: Send + Sync {
    /// String tag matching the `type` field of supported checker data.
    fn kind(&self) -> &'static str;

    /// Whether this checker can handle the record's checker data.
    fn should_check(&self, record: &ExternalRecord) -> bool;

    /// Runs one check against the record.
    ///
    /// Configuration errors and page-fetch failures are returned as
    /// errors; expected conditions (no match, broken download URL) are
    /// outcomes, not errors.
    async fn check(&self, record: &mut ExternalRecord) -> Result<CheckOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(CheckOutcome::UpdateFound.to_string(), "new version found");
        assert_eq!(CheckOutcome::UpToDate.to_string(), "up to date");
        assert_eq!(CheckOutcome::NoMatch.to_string(), "no version found on page");
        assert_eq!(
            CheckOutcome::Broken.to_string(),
            "download URL is broken"
        );
    }
}
