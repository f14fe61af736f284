//! URL template expansion.
//!
//! A url-template builds a download URL from a version string instead of
//! scraping the URL off the page: `"https://x/v$major.$minor/app-$version.zip"`
//! with version `3.4.5` expands to `"https://x/v3.4/app-3.4.5.zip"`.
//!
//! The placeholder set is scoped strictly to `version`, `version<i>`,
//! `major`, `minor` and `patch`; nothing else is ever injected into the
//! substitution map.

use std::collections::HashMap;

use crate::version::LooseVersion;

/// Errors raised while expanding a url-template.
///
/// These are configuration errors: the template author referenced something
/// the version cannot supply, or wrote a placeholder the syntax does not
/// allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template references a placeholder the version does not provide
    /// (e.g. `$patch` for a two-component version).
    UnknownPlaceholder(String),
    /// A `$` is not followed by a valid placeholder name, `{name}` or `$`.
    MalformedPlaceholder(String),
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::UnknownPlaceholder(name) => {
                write!(f, "Unknown placeholder '${}' in url-template", name)
            }
            TemplateError::MalformedPlaceholder(context) => {
                write!(f, "Malformed placeholder near '{}' in url-template", context)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Expands `template` with placeholders derived from `version`.
///
/// Supported syntax is `$name`, `${name}` and `$$` for a literal dollar.
/// The substitution map holds the full version string as `version`, each
/// decomposed component as `version0..versionN`, and `major`/`minor`/`patch`
/// aliases for the first three components when present.
pub fn expand_url_template(template: &str, version: &str) -> Result<String, TemplateError> {
    let vars = placeholder_map(version);

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];

        if let Some(after) = rest.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(after) = rest.strip_prefix('{') {
            let Some(end) = after.find('}') else {
                return Err(TemplateError::MalformedPlaceholder(truncate(rest)));
            };
            out.push_str(lookup(&vars, &after[..end])?);
            rest = &after[end + 1..];
        } else {
            let end = identifier_end(rest);
            if end == 0 {
                return Err(TemplateError::MalformedPlaceholder(truncate(rest)));
            }
            out.push_str(lookup(&vars, &rest[..end])?);
            rest = &rest[end..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn placeholder_map(version: &str) -> HashMap<String, String> {
    let decomposed = LooseVersion::new(version);
    let mut vars = HashMap::new();
    vars.insert("version".to_string(), version.to_string());
    for (i, component) in decomposed.components().iter().enumerate() {
        vars.insert(format!("version{}", i), component.to_string());
        let alias = match i {
            0 => Some("major"),
            1 => Some("minor"),
            2 => Some("patch"),
            _ => None,
        };
        if let Some(alias) = alias {
            vars.insert(alias.to_string(), component.to_string());
        }
    }
    vars
}

fn lookup<'a>(vars: &'a HashMap<String, String>, name: &str) -> Result<&'a str, TemplateError> {
    vars.get(name)
        .map(String::as_str)
        .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))
}

/// Length of the leading identifier (`[A-Za-z_][A-Za-z0-9_]*`) of `s`.
fn identifier_end(s: &str) -> usize {
    let mut end = 0;
    for (i, ch) in s.char_indices() {
        let valid = if i == 0 {
            ch.is_ascii_alphabetic() || ch == '_'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        if !valid {
            break;
        }
        end = i + ch.len_utf8();
    }
    end
}

fn truncate(s: &str) -> String {
    s.chars().take(16).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_aliases_and_full_version() {
        let expanded =
            expand_url_template("https://x/v$major.$minor/app-$version.zip", "3.4.5").unwrap();
        assert_eq!(expanded, "https://x/v3.4/app-3.4.5.zip");
    }

    #[test]
    fn test_expand_indexed_components() {
        let expanded = expand_url_template("app-${version0}_${version1}.tar.gz", "2.7.1").unwrap();
        assert_eq!(expanded, "app-2_7.tar.gz");
    }

    #[test]
    fn test_missing_patch_fails() {
        let result = expand_url_template("app-$patch.zip", "3.4");
        assert_eq!(
            result,
            Err(TemplateError::UnknownPlaceholder("patch".into()))
        );
    }

    #[test]
    fn test_unknown_placeholder_fails() {
        let result = expand_url_template("app-$arch.zip", "3.4.5");
        assert_eq!(result, Err(TemplateError::UnknownPlaceholder("arch".into())));
    }

    #[test]
    fn test_escaped_dollar_is_literal() {
        let expanded = expand_url_template("price$$$major", "9").unwrap();
        assert_eq!(expanded, "price$9");
    }

    #[test]
    fn test_dangling_dollar_fails() {
        assert!(matches!(
            expand_url_template("app-$.zip", "1.0"),
            Err(TemplateError::MalformedPlaceholder(_))
        ));
        assert!(matches!(
            expand_url_template("app-$", "1.0"),
            Err(TemplateError::MalformedPlaceholder(_))
        ));
    }

    #[test]
    fn test_unterminated_brace_fails() {
        assert!(matches!(
            expand_url_template("app-${version.zip", "1.0"),
            Err(TemplateError::MalformedPlaceholder(_))
        ));
    }

    #[test]
    fn test_textual_component_expands_as_text() {
        let expanded = expand_url_template("$major-$version1", "1.beta").unwrap();
        assert_eq!(expanded, "1-beta");
    }

    #[test]
    fn test_no_placeholders_passes_through() {
        let expanded = expand_url_template("https://example.com/app.zip", "1.0").unwrap();
        assert_eq!(expanded, "https://example.com/app.zip");
    }
}
