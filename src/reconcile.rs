// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation driver.
//!
//! Applies Ingress DNS diffs to both providers and turns the outcome into an
//! admission decision.
//!
//! # Admission path
//!
//! For every change (deletions first, then upserts) both updaters are
//! called. As soon as one host produces an error the remaining hosts are
//! left untouched and the request is denied with that host's errors
//! (fail-fast). Changes already applied for earlier hosts are not rolled
//! back; the next edit or resync heals them.
//!
//! # Resync path
//!
//! Every host of every Ingress in the cluster is upserted again to undo
//! drift from manual provider changes or failed deletions. Deletions are
//! never replayed. Any error aborts the whole pass.
//!
//! The authoritative domains and hosted zones are read once per request or
//! pass and never cached across them.

use k8s_openapi::api::networking::v1::IngressSpec;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bind9::InternalDnsUpdater;
use crate::diff::{compute_diff, ingress_hosts, namespace_cleanup_diff};
use crate::diff::{AdmissionOperation, ChangeAction, IngressDiff};
use crate::dns_errors::{join_messages, SyncError};
use crate::domains::{AuthoritativeDomain, DomainSource};
use crate::kubernetes::IngressSource;
use crate::metrics;
use crate::route53::{ExternalDnsUpdater, ExternalHostedZone};

/// Why an updater made no change for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The provider is not configured
    ProviderDisabled,
    /// The host is not in the exposure policy
    NotExposed,
    /// No authoritative domain or hosted zone contains the host
    NoAuthoritativeZone,
}

/// Result of one successful updater call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The provider accepted the change
    Applied,
    /// Nothing was sent
    Skipped(SkipReason),
}

/// Outcome of an admission review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Admit the object unchanged
    Allowed,
    /// Refuse the object
    Denied {
        /// Every error collected up to the abort point, in order
        errors: Vec<SyncError>,
    },
}

impl AdmissionDecision {
    fn denied(error: SyncError) -> Self {
        Self::Denied {
            errors: vec![error],
        }
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Denial message as shown to the API client.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Allowed => None,
            Self::Denied { errors } => Some(join_messages(errors)),
        }
    }
}

/// A resync pass that did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResyncError {
    /// A data source could not be read; nothing was changed
    #[error(transparent)]
    Source(SyncError),

    /// Upserting a host failed; later hosts were not processed
    #[error("Resync aborted at host {host}: {}", join_messages(.errors))]
    Host {
        /// Host that failed
        host: String,
        /// Errors from both providers for that host
        errors: Vec<SyncError>,
    },
}

/// What a completed resync pass covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncSummary {
    /// Ingresses enumerated
    pub ingresses: usize,
    /// Host upserts performed
    pub hosts: usize,
}

/// Per-request snapshot of the provider data sources.
struct ProviderSnapshot {
    domains: Vec<AuthoritativeDomain>,
    zones: Option<Vec<ExternalHostedZone>>,
}

/// Drives both DNS updaters for admission reviews and resync passes.
pub struct IngressDnsReconciler {
    domains: Arc<dyn DomainSource>,
    ingresses: Arc<dyn IngressSource>,
    internal: InternalDnsUpdater,
    external: ExternalDnsUpdater,
}

impl IngressDnsReconciler {
    #[must_use]
    pub fn new(
        domains: Arc<dyn DomainSource>,
        ingresses: Arc<dyn IngressSource>,
        internal: InternalDnsUpdater,
        external: ExternalDnsUpdater,
    ) -> Self {
        Self {
            domains,
            ingresses,
            internal,
            external,
        }
    }

    /// Decide an Ingress admission request.
    pub async fn review_ingress(
        &self,
        operation: &AdmissionOperation,
        new_spec: Option<&IngressSpec>,
        old_spec: Option<&IngressSpec>,
    ) -> AdmissionDecision {
        let diff = match compute_diff(operation, new_spec, old_spec) {
            Ok(diff) => diff,
            Err(err) => {
                warn!(operation = %operation, error = %err, "Cannot compute DNS diff");
                return AdmissionDecision::denied(err);
            }
        };

        debug!(
            operation = %operation,
            upserts = diff.upsert_hosts.len(),
            deletes = diff.delete_hosts.len(),
            "Computed ingress DNS diff"
        );

        self.apply_diff(&diff).await
    }

    /// Decide a namespace deletion: remove the records of every Ingress in it.
    pub async fn cleanup_namespace(&self, namespace: &str) -> AdmissionDecision {
        let ingresses = match self.ingresses.namespace_ingresses(namespace).await {
            Ok(ingresses) => ingresses,
            Err(err) => {
                error!(namespace = %namespace, error = %err, "Failed to list ingresses");
                return AdmissionDecision::denied(err);
            }
        };

        let diff = namespace_cleanup_diff(&ingresses);
        info!(
            namespace = %namespace,
            ingresses = ingresses.len(),
            hosts = diff.delete_hosts.len(),
            "Cleaning up DNS records of deleted namespace"
        );

        self.apply_diff(&diff).await
    }

    /// Apply a diff, stopping at the first host that fails.
    pub async fn apply_diff(&self, diff: &IngressDiff) -> AdmissionDecision {
        if diff.is_empty() {
            return AdmissionDecision::Allowed;
        }

        let snapshot = match self.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(error = %err, "Failed to load DNS provider data");
                return AdmissionDecision::denied(err);
            }
        };

        for change in diff.changes() {
            let errors = self
                .apply_host(&snapshot, change.action, &change.host)
                .await;

            if !errors.is_empty() {
                warn!(
                    host = %change.host,
                    action = change.action.as_str(),
                    errors = %join_messages(&errors),
                    "DNS change failed, denying request"
                );
                return AdmissionDecision::Denied { errors };
            }
        }

        AdmissionDecision::Allowed
    }

    /// Upsert every host of every Ingress in the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::Source`] if a data source cannot be read and
    /// [`ResyncError::Host`] at the first host that fails.
    pub async fn resync(&self) -> Result<ResyncSummary, ResyncError> {
        let start = Instant::now();
        let result = self.resync_pass().await;
        metrics::record_resync(result.is_ok(), start.elapsed());

        match &result {
            Ok(summary) => info!(
                ingresses = summary.ingresses,
                hosts = summary.hosts,
                elapsed = ?start.elapsed(),
                "Resync pass completed"
            ),
            Err(err) => error!(error = %err, "Resync pass failed"),
        }

        result
    }

    async fn resync_pass(&self) -> Result<ResyncSummary, ResyncError> {
        let ingresses = self
            .ingresses
            .all_ingresses()
            .await
            .map_err(ResyncError::Source)?;
        let snapshot = self.snapshot().await.map_err(ResyncError::Source)?;

        let mut summary = ResyncSummary {
            ingresses: ingresses.len(),
            hosts: 0,
        };

        for ingress in &ingresses {
            for host in ingress_hosts(ingress.spec.as_ref()) {
                let errors = self
                    .apply_host(&snapshot, ChangeAction::Upsert, &host)
                    .await;
                if !errors.is_empty() {
                    return Err(ResyncError::Host { host, errors });
                }
                summary.hosts += 1;
            }
        }

        Ok(summary)
    }

    async fn snapshot(&self) -> Result<ProviderSnapshot, SyncError> {
        let domains = self.domains.authoritative_domains().await?;
        let zones = self.external.list_zones().await?;

        Ok(ProviderSnapshot { domains, zones })
    }

    /// Call both updaters for one host and collect their errors.
    async fn apply_host(
        &self,
        snapshot: &ProviderSnapshot,
        action: ChangeAction,
        host: &str,
    ) -> Vec<SyncError> {
        let zones = snapshot.zones.as_deref();

        let results = match action {
            ChangeAction::Upsert => [
                self.internal.upsert(&snapshot.domains, host).await,
                self.external.upsert(zones, host).await,
            ],
            ChangeAction::Delete => [
                self.internal.delete(&snapshot.domains, host).await,
                self.external.delete(zones, host).await,
            ],
        };

        results
            .into_iter()
            .filter_map(|result| match result {
                Ok(outcome) => {
                    debug!(host = %host, action = action.as_str(), outcome = ?outcome, "Updater finished");
                    None
                }
                Err(err) => Some(err),
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod reconcile_tests;
