// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! External DNS updates against Route53 hosted zones.
//!
//! The external provider is optional. Without credentials the updater is
//! disabled: the hosted-zone listing is *absent* (not empty) and every call
//! returns [`SkipReason::ProviderDisabled`] without touching the network.
//!
//! Only hosts matched by the exposure policy are published, and they always
//! point at the single forwarded address of the public ingress.

pub mod client;

pub use client::{ExternalHostedZone, HostedZoneProvider, Route53Provider, Route53Settings};

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::diff::ChangeAction;
use crate::dns_errors::{Provider, ProviderError, SyncError};
use crate::metrics;
use crate::policy::ZoneAuthorityResolver;
use crate::reconcile::{SkipReason, UpdateOutcome};
use crate::retry::{retry_provider_call, RetryPolicy};

/// First hosted zone whose name, without trailing dot, ends `host`.
#[must_use]
pub fn find_hosted_zone<'a>(
    zones: &'a [ExternalHostedZone],
    host: &str,
) -> Option<&'a ExternalHostedZone> {
    zones
        .iter()
        .find(|zone| host.ends_with(zone.name.trim_end_matches('.')))
}

struct ExternalBackend {
    provider: Arc<dyn HostedZoneProvider>,
    forwarded_ip: Ipv4Addr,
}

/// Publishes exposed Ingress hosts to the external provider.
pub struct ExternalDnsUpdater {
    resolver: Arc<ZoneAuthorityResolver>,
    backend: Option<ExternalBackend>,
    retry: RetryPolicy,
}

impl ExternalDnsUpdater {
    /// Updater for a configured provider; records point at `forwarded_ip`.
    #[must_use]
    pub fn new(
        resolver: Arc<ZoneAuthorityResolver>,
        provider: Arc<dyn HostedZoneProvider>,
        forwarded_ip: Ipv4Addr,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            backend: Some(ExternalBackend {
                provider,
                forwarded_ip,
            }),
            retry,
        }
    }

    /// Updater with no provider configured; every call is a no-op.
    #[must_use]
    pub fn disabled(resolver: Arc<ZoneAuthorityResolver>) -> Self {
        Self {
            resolver,
            backend: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Whether an external provider is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Current hosted zones, or `None` when the provider is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SourceUnavailable`] if the listing fails after
    /// retries.
    pub async fn list_zones(&self) -> Result<Option<Vec<ExternalHostedZone>>, SyncError> {
        let Some(backend) = &self.backend else {
            debug!("External provider not configured, no hosted zones");
            return Ok(None);
        };

        let zones = retry_provider_call(&self.retry, "list hosted zones", || {
            let provider = Arc::clone(&backend.provider);
            async move { provider.list_hosted_zones().await }
        })
        .await
        .map_err(|e| SyncError::SourceUnavailable {
            source_name: "external hosted zones",
            reason: e.to_string(),
        })?;

        debug!(count = zones.len(), "Loaded external hosted zones");
        Ok(Some(zones))
    }

    /// Point `host` at the forwarded address if it is exposed.
    ///
    /// A disabled provider skips before the certificate check, so an uncovered
    /// host is then reported by the internal updater alone.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AuthorityDenied`] if the cluster certificate does
    /// not cover `host`, and [`SyncError::Provider`] if the change is rejected.
    pub async fn upsert(
        &self,
        zones: Option<&[ExternalHostedZone]>,
        host: &str,
    ) -> Result<UpdateOutcome, SyncError> {
        let Some(backend) = &self.backend else {
            return Ok(UpdateOutcome::Skipped(SkipReason::ProviderDisabled));
        };

        if !self.resolver.is_cert_covered(host) {
            return Err(SyncError::AuthorityDenied {
                host: host.to_string(),
            });
        }

        self.change(backend, zones, ChangeAction::Upsert, host).await
    }

    /// Remove the external record of `host` if it is exposed.
    ///
    /// No certificate check is made so stale hosts can still be removed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Provider`] if the change is rejected.
    pub async fn delete(
        &self,
        zones: Option<&[ExternalHostedZone]>,
        host: &str,
    ) -> Result<UpdateOutcome, SyncError> {
        let Some(backend) = &self.backend else {
            return Ok(UpdateOutcome::Skipped(SkipReason::ProviderDisabled));
        };

        self.change(backend, zones, ChangeAction::Delete, host).await
    }

    async fn change(
        &self,
        backend: &ExternalBackend,
        zones: Option<&[ExternalHostedZone]>,
        action: ChangeAction,
        host: &str,
    ) -> Result<UpdateOutcome, SyncError> {
        let Some(zones) = zones else {
            return Ok(UpdateOutcome::Skipped(SkipReason::ProviderDisabled));
        };

        if !self.resolver.is_externally_exposed(host) {
            debug!(host = %host, "Host not exposed, skipping external DNS");
            return Ok(UpdateOutcome::Skipped(SkipReason::NotExposed));
        }

        let Some(zone) = find_hosted_zone(zones, host) else {
            info!(host = %host, "No external authoritative domain found for host");
            return Ok(UpdateOutcome::Skipped(SkipReason::NoAuthoritativeZone));
        };

        let record_name = format!("{host}.");
        let start = Instant::now();
        let operation_name = format!("external {} {host}", action.as_str());

        let result = retry_provider_call(&self.retry, &operation_name, || {
            let provider = Arc::clone(&backend.provider);
            let zone_id = zone.id.clone();
            let record_name = record_name.clone();
            let value = backend.forwarded_ip;
            async move {
                provider
                    .change_a_record(&zone_id, action, &record_name, value)
                    .await
            }
        })
        .await;

        metrics::record_dns_change(Provider::External, action, result.is_ok(), start.elapsed());

        match result {
            Ok(change_id) => {
                info!(
                    host = %host,
                    zone = %zone.name,
                    action = action.as_str(),
                    change_id = %change_id,
                    "External DNS change submitted"
                );
                Ok(UpdateOutcome::Applied)
            }
            Err(err) => Err(ProviderError {
                provider: Provider::External,
                action,
                host: host.to_string(),
                code: err.code().map(ToString::to_string),
                transient: err.is_transient(),
                reason: err.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
