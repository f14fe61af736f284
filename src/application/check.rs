//! Check action - orchestrates checking every record in a manifest.
//!
//! Records are checked sequentially. A record that cannot be checked
//! (unknown checker type, configuration defect, unreachable page) is
//! reported and skipped; it never aborts the rest of the batch.

use log::warn;
use std::fmt;

use crate::checker::{CheckOutcome, CheckerRegistry};
use crate::manifest::Manifest;

/// How a single record fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// The check ran to completion.
    Done(CheckOutcome),
    /// The record was not checked.
    Skipped(String),
    /// The check errored (configuration defect or page fetch failure).
    Failed(String),
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Done(outcome) => write!(f, "{}", outcome),
            CheckStatus::Skipped(reason) => write!(f, "skipped ({})", reason),
            CheckStatus::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Result of checking a single record.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub filename: String,
    pub status: CheckStatus,
}

/// Check action - runs every record in a manifest through its checker.
pub struct CheckAction<'a> {
    registry: &'a CheckerRegistry,
}

impl<'a> CheckAction<'a> {
    pub fn new(registry: &'a CheckerRegistry) -> Self {
        Self { registry }
    }

    /// Checks all records, mutating them in place.
    ///
    /// Returns one result per record, in manifest order.
    pub async fn check_all(&self, manifest: &mut Manifest) -> Vec<CheckResult> {
        let mut results = Vec::with_capacity(manifest.records.len());

        for record in &mut manifest.records {
            let filename = record.filename.clone();

            let checker = match self.registry.for_record(record) {
                Ok(checker) => checker,
                Err(e) => {
                    warn!("Skipping {}: {}", filename, e);
                    results.push(CheckResult {
                        filename,
                        status: CheckStatus::Skipped(format!("{}", e)),
                    });
                    continue;
                }
            };

            if !checker.should_check(record) {
                results.push(CheckResult {
                    filename,
                    status: CheckStatus::Skipped("checker declined the record".into()),
                });
                continue;
            }

            let status = match checker.check(record).await {
                Ok(outcome) => CheckStatus::Done(outcome),
                Err(e) => {
                    warn!("Check failed for {}: {:#}", filename, e);
                    CheckStatus::Failed(format!("{:#}", e))
                }
            };
            results.push(CheckResult { filename, status });
        }

        results
    }
}
