//! External record model.
//!
//! An external record describes one tracked artifact: which page to check,
//! how to extract a version from it, and what the last known good version
//! was. Records outlive individual checks; a check mutates its record at
//! most once, either marking it broken or installing a freshly resolved
//! version descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Not checked yet, or the last check could not reach a verdict.
    #[default]
    Unknown,
    /// The last check resolved and validated a download URL.
    Ok,
    /// The resolved download URL could not be validated.
    Broken,
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordState::Unknown => write!(f, "unknown"),
            RecordState::Ok => write!(f, "ok"),
            RecordState::Broken => write!(f, "broken"),
        }
    }
}

/// A resolved version: the version string extracted from the page plus the
/// validated metadata of its download URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub version: String,
    /// Absolute download URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Hex-encoded sha256 of the resource body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// The checker configuration attached to a record: a `type` tag selecting
/// the checker, plus checker-specific keys kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// One tracked external artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExternalRecord {
    /// Identifier used in logs and reports.
    pub filename: String,
    pub checker_data: CheckerData,
    #[serde(default)]
    pub state: RecordState,
    /// Version currently recorded in the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<VersionDescriptor>,
    /// Version discovered by the latest check, when it differs from
    /// `current`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<VersionDescriptor>,
}

impl ExternalRecord {
    /// Installs a freshly resolved version descriptor.
    ///
    /// This is the single success-path mutation of a check: the record
    /// becomes [`RecordState::Ok`], and the descriptor is kept as
    /// `new_version` unless it matches `current` (already up to date).
    /// Re-applying the same descriptor reaches the same terminal state.
    pub fn set_new_version(&mut self, descriptor: VersionDescriptor) {
        if self.current.as_ref() == Some(&descriptor) {
            self.new_version = None;
        } else {
            self.new_version = Some(descriptor);
        }
        self.state = RecordState::Ok;
    }
}
