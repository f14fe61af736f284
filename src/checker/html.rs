//! HTML page checker.
//!
//! Scrapes an arbitrary HTML page with operator-supplied regular
//! expressions to discover the latest released version and its download
//! URL. Either a single combo pattern captures (URL, version) together,
//! or a version pattern is paired with a URL pattern or a url-template.
//! The resolved URL is then validated with a metadata fetch before the
//! record is updated.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use url::Url;

use super::{CheckOutcome, Checker};
use crate::http::HttpClient;
use crate::record::{ExternalRecord, RecordState, VersionDescriptor};
use crate::template::expand_url_template;
use crate::version::LooseVersion;

/// Checker data `type` tag handled by [`HtmlChecker`].
pub const HTML_CHECKER_KIND: &str = "html";

/// Configuration errors detected before any network access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A pattern failed to compile.
    InvalidPattern { name: &'static str, message: String },
    /// A pattern has the wrong number of capture groups.
    WrongGroupCount {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    /// No workable pattern combination was supplied.
    MissingPatterns,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPattern { name, message } => {
                write!(f, "Invalid '{}': {}", name, message)
            }
            ConfigError::WrongGroupCount {
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "'{}' must have exactly {} capture group(s), found {}",
                    name, expected, found
                )
            }
            ConfigError::MissingPatterns => {
                write!(
                    f,
                    "checker data must provide 'pattern', or 'version-pattern' \
                     with 'url-pattern' or 'url-template'"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Checker data for HTML page checks.
///
/// Key names are the stable configuration surface; they must not change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HtmlCheckerData {
    /// Page to scrape.
    pub url: String,
    /// Combo pattern capturing (URL, version) in one match.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Pattern capturing the version alone.
    #[serde(default)]
    pub version_pattern: Option<String>,
    /// Pattern capturing the download URL alone.
    #[serde(default)]
    pub url_pattern: Option<String>,
    /// Template building the download URL from the version.
    #[serde(default)]
    pub url_template: Option<String>,
    /// Rank multiple matches by version order; disable to trust page
    /// order instead (newest listed first).
    #[serde(default = "default_sort_matches")]
    pub sort_matches: bool,
}

fn default_sort_matches() -> bool {
    true
}

/// Patterns compiled and validated ahead of any fetch.
#[derive(Debug)]
struct CompiledPatterns {
    combo: Option<Regex>,
    version: Option<Regex>,
    url: Option<Regex>,
}

impl CompiledPatterns {
    fn compile(data: &HtmlCheckerData) -> Result<Self, ConfigError> {
        let combo = compile_pattern("pattern", data.pattern.as_deref(), 2)?;
        let version = compile_pattern("version-pattern", data.version_pattern.as_deref(), 1)?;
        let url = compile_pattern("url-pattern", data.url_pattern.as_deref(), 1)?;

        if combo.is_none() && (version.is_none() || (url.is_none() && data.url_template.is_none()))
        {
            return Err(ConfigError::MissingPatterns);
        }
        Ok(Self {
            combo,
            version,
            url,
        })
    }
}

fn compile_pattern(
    name: &'static str,
    source: Option<&str>,
    groups: usize,
) -> Result<Option<Regex>, ConfigError> {
    let Some(source) = source else {
        return Ok(None);
    };
    let regex = Regex::new(source).map_err(|e| ConfigError::InvalidPattern {
        name,
        message: e.to_string(),
    })?;
    // Group 0 is the whole match
    let found = regex.captures_len() - 1;
    if found != groups {
        return Err(ConfigError::WrongGroupCount {
            name,
            expected: groups,
            found,
        });
    }
    Ok(Some(regex))
}

/// One pattern match: a bare string, or a (URL, version) pair from a
/// combo pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MatchResult {
    Single(String),
    Pair { url: String, version: String },
}

impl MatchResult {
    /// Key used to rank matches: the version element for pairs, the match
    /// itself otherwise.
    fn sort_key(&self) -> LooseVersion {
        match self {
            MatchResult::Single(value) => LooseVersion::new(value.as_str()),
            MatchResult::Pair { version, .. } => LooseVersion::new(version.as_str()),
        }
    }

    fn into_single(self) -> Option<String> {
        match self {
            MatchResult::Single(value) => Some(value),
            MatchResult::Pair { .. } => None,
        }
    }
}

/// Selects the "latest" match of `pattern` in `text`.
///
/// With `sort` disabled the first match in page order wins. With it
/// enabled, matches are ranked by lenient version order; ties keep the
/// first occurrence.
fn select_latest(text: &str, pattern: &Regex, sort: bool) -> Option<MatchResult> {
    // Unmatched optional groups extract as empty, they do not fail the match
    let group = |caps: &regex::Captures<'_>, i: usize| {
        caps.get(i).map_or_else(String::new, |m| m.as_str().to_string())
    };
    let mut matches = pattern.captures_iter(text).map(|caps| {
        if caps.len() == 3 {
            MatchResult::Pair {
                url: group(&caps, 1),
                version: group(&caps, 2),
            }
        } else {
            MatchResult::Single(group(&caps, 1))
        }
    });

    let Some(first) = matches.next() else {
        warn!("{} did not match", pattern.as_str());
        return None;
    };

    let result = if sort {
        let first_key = first.sort_key();
        matches
            .fold((first, first_key), |(best, best_key), candidate| {
                let key = candidate.sort_key();
                if key > best_key {
                    (candidate, key)
                } else {
                    (best, best_key)
                }
            })
            .0
    } else {
        first
    };
    debug!("{} matched {:?}", pattern.as_str(), result);
    Some(result)
}

/// Checker that scrapes HTML release pages with configured patterns.
pub struct HtmlChecker {
    http: HttpClient,
}

impl HtmlChecker {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn parse_data(record: &ExternalRecord) -> Result<HtmlCheckerData> {
        let value = serde_json::Value::Object(record.checker_data.data.clone());
        serde_json::from_value(value)
            .with_context(|| format!("Invalid checker data for {}", record.filename))
    }

    /// Validates the resolved URL and installs the new version.
    ///
    /// A transport failure marks the record broken instead of raising; a
    /// broken candidate URL is a reportable outcome, not a crash. On
    /// success the page-extracted version overrides whatever the metadata
    /// fetch guessed from the filename.
    async fn update_version(
        &self,
        record: &mut ExternalRecord,
        version: &str,
        url: &str,
        follow_redirects: bool,
    ) -> Result<CheckOutcome> {
        match self.http.describe_remote(url, follow_redirects).await {
            Ok(remote) => {
                if let Some(guess) = &remote.version {
                    if guess != version {
                        debug!(
                            "Remote filename suggests version {}, keeping page version {}",
                            guess, version
                        );
                    }
                }
                record.set_new_version(VersionDescriptor {
                    version: version.to_string(),
                    url: remote.url,
                    size: Some(remote.size),
                    checksum: Some(remote.checksum),
                });
                if record.new_version.is_some() {
                    Ok(CheckOutcome::UpdateFound)
                } else {
                    Ok(CheckOutcome::UpToDate)
                }
            }
            Err(e) if is_transport_error(&e) => {
                warn!("{} returned {}", url, e);
                record.state = RecordState::Broken;
                Ok(CheckOutcome::Broken)
            }
            Err(e) => Err(e),
        }
    }
}

fn is_transport_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<reqwest::Error>().is_some()
        || e.downcast_ref::<crate::http::RedirectError>().is_some()
}

#[async_trait]
impl Checker for HtmlChecker {
    fn kind(&self) -> &'static str {
        HTML_CHECKER_KIND
    }

    fn should_check(&self, record: &ExternalRecord) -> bool {
        record.checker_data.kind == HTML_CHECKER_KIND
    }

    async fn check(&self, record: &mut ExternalRecord) -> Result<CheckOutcome> {
        debug_assert!(self.should_check(record));

        let data = Self::parse_data(record)?;
        // Configuration must be rejected before any network cost
        let patterns = CompiledPatterns::compile(&data)
            .with_context(|| format!("Invalid checker configuration for {}", record.filename))?;

        let page = self
            .http
            .get_text(&data.url)
            .await
            .with_context(|| format!("Failed to fetch {}", data.url))?;

        let mut latest_version: Option<String> = None;
        let mut latest_url: Option<String> = None;

        if let Some(combo) = &patterns.combo {
            if let Some(MatchResult::Pair { url, version }) =
                select_latest(&page, combo, data.sort_matches)
            {
                latest_url = Some(url);
                latest_version = Some(version);
            }
        } else if let Some(version_pattern) = &patterns.version {
            latest_version = select_latest(&page, version_pattern, data.sort_matches)
                .and_then(MatchResult::into_single);

            if let Some(version) = &latest_version {
                if let Some(template) = &data.url_template {
                    latest_url = Some(
                        expand_url_template(template, version).with_context(|| {
                            format!("Invalid url-template for {}", record.filename)
                        })?,
                    );
                } else if let Some(url_pattern) = &patterns.url {
                    latest_url = select_latest(&page, url_pattern, data.sort_matches)
                        .and_then(MatchResult::into_single);
                }
            }
        }

        let (Some(version), Some(candidate)) = (latest_version, latest_url) else {
            warn!("Couldn't get version and/or URL for {}", record.filename);
            return Ok(CheckOutcome::NoMatch);
        };

        let base = Url::parse(&data.url)
            .with_context(|| format!("Invalid page URL for {}: {}", record.filename, data.url))?;
        let absolute = base
            .join(&candidate)
            .with_context(|| format!("Cannot resolve {} against {}", candidate, data.url))?;

        self.update_version(record, &version, absolute.as_str(), false)
            .await
    }
}
