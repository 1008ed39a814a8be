//! Account selection.
//!
//! A selector is one or more patterns separated by whitespace and/or commas.
//! Each pattern is an exact account name or a shell-style glob where `*`
//! matches any substring (`?` and `[...]`/`[!...]` classes are honoured as well).
//! An account is selected when it matches any pattern.

use std::collections::BTreeSet;

use glob::{Pattern, PatternError};
use log::{debug, warn};

use crate::error::{SawsError, SawsResult};
use crate::utils::config::AppConfig;

/// A compiled selector pattern.
#[derive(Debug)]
pub struct GlobPattern {
    raw: String,
    pattern: Pattern,
}

impl GlobPattern {
    pub fn new(raw: &str) -> Result<Self, PatternError> {
        Ok(Self {
            raw: raw.to_string(),
            pattern: Pattern::new(raw)?,
        })
    }

    /// Exact equality first, then the glob.
    pub fn matches(&self, name: &str) -> bool {
        self.raw == name || self.pattern.matches(name)
    }
}

/// Splits a raw selector on whitespace and commas, dropping empty entries.
pub fn split_selector(selector: &str) -> Vec<String> {
    selector
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Resolves a selector expression to a sorted, deduplicated list of account names.
pub fn resolve(selector: &str, config: &AppConfig) -> SawsResult<Vec<String>> {
    let raw_patterns = split_selector(selector);
    if raw_patterns.is_empty() {
        return Err(SawsError::EmptySelector(selector.to_string()));
    }
    debug!("Applying selector patterns: {:?}", raw_patterns);

    let patterns: Vec<GlobPattern> = raw_patterns
        .iter()
        .filter_map(|raw| match GlobPattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!("Skipping invalid selector pattern '{}': {}", raw, e);
                None
            }
        })
        .collect();

    let matched: BTreeSet<String> = config
        .account_names()
        .filter(|name| patterns.iter().any(|p| p.matches(name)))
        .map(String::from)
        .collect();

    if matched.is_empty() {
        return Err(SawsError::NoMatch {
            selector: selector.to_string(),
        });
    }

    let names: Vec<String> = matched.into_iter().collect();
    debug!("Selected {} account(s) using selector '{}': {:?}", names.len(), selector, names);
    Ok(names)
}

/// Every account in the registry, sorted.
pub fn resolve_all(config: &AppConfig) -> Vec<String> {
    let names: Vec<String> = config.account_names().map(String::from).collect();
    debug!("Processing all {} defined accounts", names.len());
    names
}
