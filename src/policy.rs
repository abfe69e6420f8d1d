// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate coverage and external exposure policy.
//!
//! Two independent sets of [`AuthorityEntry`] values are loaded once at
//! startup from JSON files mounted into the controller pod:
//!
//! - **certificate coverage** (`cluster_cert_entries.json`) - the hostnames the
//!   cluster's issued TLS certificate is valid for. Ingresses with any other
//!   host are refused at admission time.
//! - **exposure** (`external_domains.json`) - the hostnames that are also
//!   published to the external DNS provider.
//!
//! A host matches an entry if it matches any glob `{name}.{zone}` built from
//! the entry's name patterns (`*`, `?` and `[...]` classes, `*` spans dots),
//! or if it equals the zone itself while the entry covers the apex.
//!
//! Policies are immutable for the lifetime of the process; changing them
//! requires a restart.
//!
//! # Example
//!
//! ```rust
//! use ingressdns::policy::{AuthorityEntry, AuthorityPolicy, ZoneAuthorityResolver};
//!
//! let certs = AuthorityPolicy::new(vec![AuthorityEntry {
//!     zone: "example.com".to_string(),
//!     name_patterns: vec!["*".to_string()],
//!     apex_covered: false,
//! }])
//! .unwrap();
//! let resolver = ZoneAuthorityResolver::new(certs, AuthorityPolicy::default());
//!
//! assert!(resolver.is_cert_covered("svc.example.com"));
//! assert!(!resolver.is_cert_covered("example.com"));
//! assert!(!resolver.is_externally_exposed("svc.example.com"));
//! ```

use glob::Pattern;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// One zone worth of name patterns, as written in the policy files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorityEntry {
    /// DNS zone, e.g. `example.com`
    pub zone: String,

    /// Glob patterns for the name part left of the zone, e.g. `*` or `api-?`
    #[serde(rename = "names", default)]
    pub name_patterns: Vec<String>,

    /// Whether the zone apex itself is covered.
    ///
    /// The certificate file calls this `apex_zone_san`, the exposure file
    /// `expose_apex`.
    #[serde(alias = "apex_zone_san", alias = "expose_apex", default)]
    pub apex_covered: bool,
}

/// Errors raised while loading a policy file.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// The policy file could not be read
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        /// Path of the policy file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The policy file is not a JSON array of entries
    #[error("Failed to parse policy file {path}: {source}")]
    Parse {
        /// Path of the policy file
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// A name pattern does not compile as a glob
    #[error("Invalid name pattern '{pattern}': {source}")]
    Pattern {
        /// The combined `{name}.{zone}` pattern
        pattern: String,
        /// Underlying glob error
        source: glob::PatternError,
    },
}

#[derive(Debug, Clone)]
struct CompiledEntry {
    zone: String,
    patterns: Vec<Pattern>,
    apex_covered: bool,
}

impl CompiledEntry {
    fn matches(&self, host: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(host))
            || (self.apex_covered && self.zone == host)
    }
}

/// Fold each run of `*` into one. `**` means `*` in shell globs but is a
/// recursive wildcard to [`Pattern`], which rejects it next to other text.
fn collapse_stars(pattern: &str) -> String {
    let mut collapsed = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}

/// A compiled, immutable set of authority entries.
#[derive(Debug, Clone, Default)]
pub struct AuthorityPolicy {
    entries: Vec<CompiledEntry>,
}

impl AuthorityPolicy {
    /// Compile a policy from its entries, in order.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Pattern`] if any `{name}.{zone}` is not a valid glob.
    pub fn new(entries: Vec<AuthorityEntry>) -> Result<Self, PolicyError> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let patterns = entry
                    .name_patterns
                    .iter()
                    .map(|name| {
                        let pattern = collapse_stars(&format!("{name}.{}", entry.zone));
                        Pattern::new(&pattern)
                            .map_err(|source| PolicyError::Pattern { pattern, source })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(CompiledEntry {
                    zone: entry.zone,
                    patterns,
                    apex_covered: entry.apex_covered,
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;

        Ok(Self { entries })
    }

    /// Load and compile a policy file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or compiled.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<AuthorityEntry> =
            serde_json::from_str(&content).map_err(|source| PolicyError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), entries = entries.len(), "Loaded authority policy");

        Self::new(entries)
    }

    /// True if any entry matches `host`.
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        self.entries.iter().any(|entry| entry.matches(host))
    }

    /// Number of entries in the policy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the policy has no entries (matches nothing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decides certificate coverage and external exposure for Ingress hosts.
///
/// Pure and read-only; share it behind an `Arc` across concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct ZoneAuthorityResolver {
    cert_coverage: AuthorityPolicy,
    exposure: AuthorityPolicy,
}

impl ZoneAuthorityResolver {
    /// Build a resolver from already compiled policies.
    #[must_use]
    pub fn new(cert_coverage: AuthorityPolicy, exposure: AuthorityPolicy) -> Self {
        Self {
            cert_coverage,
            exposure,
        }
    }

    /// Load both policy files.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be loaded.
    pub fn load(cert_entries: &Path, external_domains: &Path) -> Result<Self, PolicyError> {
        Ok(Self::new(
            AuthorityPolicy::load(cert_entries)?,
            AuthorityPolicy::load(external_domains)?,
        ))
    }

    /// True if the cluster certificate covers `host`.
    #[must_use]
    pub fn is_cert_covered(&self, host: &str) -> bool {
        self.cert_coverage.matches(host)
    }

    /// True if `host` is intentionally published to the external provider.
    #[must_use]
    pub fn is_externally_exposed(&self, host: &str) -> bool {
        self.exposure.matches(host)
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod policy_tests;
