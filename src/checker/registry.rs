//! Checker registry keyed by checker data type tags.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::{Checker, HtmlChecker};
use crate::http::HttpClient;
use crate::record::ExternalRecord;

/// Registry mapping checker data `type` tags to checker implementations.
pub struct CheckerRegistry {
    checkers: HashMap<&'static str, Arc<dyn Checker>>,
}

impl CheckerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            checkers: HashMap::new(),
        }
    }

    /// Creates a registry with all built-in checkers over `http`.
    pub fn with_default_checkers(http: HttpClient) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HtmlChecker::new(http)));
        registry
    }

    /// Registers a checker under its kind tag.
    ///
    /// A checker already registered for the same tag is replaced.
    pub fn register(&mut self, checker: Arc<dyn Checker>) {
        self.checkers.insert(checker.kind(), checker);
    }

    /// Gets a registered checker by kind tag.
    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Checker>> {
        self.checkers.get(kind)
    }

    /// Whether a checker is registered for `kind`.
    pub fn has(&self, kind: &str) -> bool {
        self.checkers.contains_key(kind)
    }

    /// Number of registered checkers.
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// Whether no checkers are registered.
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// All registered kind tags.
    pub fn registered_kinds(&self) -> Vec<&'static str> {
        self.checkers.keys().copied().collect()
    }

    /// Resolves the checker for a record's checker data tag.
    ///
    /// Returns an error naming the tag when no checker is registered for
    /// it.
    pub fn for_record(&self, record: &ExternalRecord) -> Result<&Arc<dyn Checker>> {
        let kind = record.checker_data.kind.as_str();
        self.checkers
            .get(kind)
            .with_context(|| format!("No checker registered for type: {}", kind))
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
