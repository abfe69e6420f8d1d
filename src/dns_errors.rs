// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for ingress DNS synchronisation.
//!
//! Every failure the admission path can run into for a single host is one
//! [`SyncError`]. Denied admission responses carry the rendered messages of
//! all errors collected up to the abort point, while [`SyncError::status_reason`]
//! provides a stable, machine-readable reason for logs and metrics.
//!
//! A disabled provider is *not* an error: it is reported as
//! [`crate::reconcile::SkipReason::ProviderDisabled`].

use crate::diff::ChangeAction;
use std::fmt;
use thiserror::Error;

/// The DNS authority a change was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Internally operated BIND9 primary (RFC 2136 + TSIG)
    Internal,
    /// External hosted-zone provider (Route53)
    External,
}

impl Provider {
    /// Lower-case label used in messages and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS backend refused or failed a change for one host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error {provider} dns {} for host {host}: {reason}", action.verb())]
pub struct ProviderError {
    /// Backend that failed
    pub provider: Provider,
    /// Change that was attempted
    pub action: ChangeAction,
    /// Ingress host the change was for
    pub host: String,
    /// DNS response code (e.g. `NotAuth`) or provider error code (e.g. `InvalidChangeBatch`)
    pub code: Option<String>,
    /// Human-readable failure, including the provider's error payload
    pub reason: String,
    /// Whether the failure was still considered transient when retries ran out
    pub transient: bool,
}

/// Errors produced while synchronising Ingress hosts to DNS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The host is not covered by the cluster certificate policy.
    ///
    /// Raised before any network call; blocks every mutation for that host.
    #[error("Host {host} is not covered by the cluster certificate")]
    AuthorityDenied {
        /// Offending Ingress host
        host: String,
    },

    /// Protocol-level failure from one of the DNS backends.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The admission operation has no defined DNS diff (e.g. `CONNECT`).
    #[error("Operation {operation} is not supported for ingress DNS")]
    UnsupportedOperation {
        /// Operation as received in the admission request
        operation: String,
    },

    /// A data source needed to plan the changes could not be read.
    ///
    /// Covers the authoritative domain store, the hosted-zone listing and the
    /// Kubernetes Ingress listing.
    #[error("Failed to read {source_name}: {reason}")]
    SourceUnavailable {
        /// Which data source failed
        source_name: &'static str,
        /// Underlying failure
        reason: String,
    },
}

impl SyncError {
    /// Returns true if retrying the whole request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider(err) => err.transient,
            Self::SourceUnavailable { .. } => true,
            Self::AuthorityDenied { .. } | Self::UnsupportedOperation { .. } => false,
        }
    }

    /// Stable reason string for logs, metrics and status messages.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::AuthorityDenied { .. } => "AuthorityDenied",
            Self::Provider(ProviderError {
                provider: Provider::Internal,
                ..
            }) => "InternalProviderError",
            Self::Provider(ProviderError {
                provider: Provider::External,
                ..
            }) => "ExternalProviderError",
            Self::UnsupportedOperation { .. } => "UnsupportedOperation",
            Self::SourceUnavailable { .. } => "SourceUnavailable",
        }
    }

    /// The Ingress host this error belongs to, if it is host-specific.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::AuthorityDenied { host } => Some(host),
            Self::Provider(err) => Some(&err.host),
            Self::UnsupportedOperation { .. } | Self::SourceUnavailable { .. } => None,
        }
    }
}

/// Render a list of errors the way admission denials present them.
#[must_use]
pub fn join_messages(errors: &[SyncError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "dns_errors_tests.rs"]
mod dns_errors_tests;
