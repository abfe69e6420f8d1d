// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Internal DNS updates against the BIND9 primary.
//!
//! Records are changed with RFC 2136 dynamic updates signed with the
//! pre-shared `internal.` TSIG key and sent over TCP.
//!
//! # Zone selection
//!
//! The zone for a host is the *first* [`AuthoritativeDomain`] whose name is a
//! string suffix of the host, in the order the domain store returned them.
//! This is plain suffix matching, not longest-match and not label-aware.
//! Hosts outside every authoritative domain are skipped without error.
//!
//! # Modules
//!
//! - [`message`] - UPDATE message construction
//! - [`transport`] - Signed TCP transport and the [`UpdateTransport`] seam
//! - [`tsig`] - TSIG key parsing and signer creation

pub mod message;
pub mod transport;
pub mod tsig;

pub use transport::{TsigTcpTransport, UpdateTransport};
pub use tsig::TsigKey;

use hickory_client::op::{Message, ResponseCode};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::constants::{APEX_RECORD_NAME, DNS_RECORD_TTL_SECS};
use crate::diff::ChangeAction;
use crate::dns_errors::{Provider, ProviderError, SyncError};
use crate::domains::AuthoritativeDomain;
use crate::metrics;
use crate::policy::ZoneAuthorityResolver;
use crate::reconcile::{SkipReason, UpdateOutcome};
use crate::retry::{retry_provider_call, CallError, RetryPolicy};

/// First authoritative domain that `host` ends with.
#[must_use]
pub fn find_authoritative_domain<'a>(
    domains: &'a [AuthoritativeDomain],
    host: &str,
) -> Option<&'a AuthoritativeDomain> {
    domains
        .iter()
        .find(|candidate| host.ends_with(candidate.domain.as_str()))
}

/// Record name of `host` relative to `domain`; `@` for the apex.
///
/// If `host` does not end in `.{domain}` it is returned unchanged.
#[must_use]
pub fn relative_record_name(host: &str, domain: &str) -> String {
    if host == domain {
        return APEX_RECORD_NAME.to_string();
    }

    host.strip_suffix(domain)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .unwrap_or(host)
        .to_string()
}

/// Keeps A records on the internal primary in line with Ingress hosts.
pub struct InternalDnsUpdater {
    resolver: Arc<ZoneAuthorityResolver>,
    transport: Arc<dyn UpdateTransport>,
    target: Ipv4Addr,
    retry: RetryPolicy,
}

impl InternalDnsUpdater {
    /// Every upserted record points at `target`, the internal ingress proxy.
    #[must_use]
    pub fn new(
        resolver: Arc<ZoneAuthorityResolver>,
        transport: Arc<dyn UpdateTransport>,
        target: Ipv4Addr,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            transport,
            target,
            retry,
        }
    }

    /// Address every upserted record points at.
    #[must_use]
    pub fn target(&self) -> Ipv4Addr {
        self.target
    }

    /// Make `host` resolve to the internal target.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AuthorityDenied`] before any network call if the
    /// cluster certificate does not cover `host`, and
    /// [`SyncError::Provider`] if the primary does not answer `NOERROR`.
    pub async fn upsert(
        &self,
        domains: &[AuthoritativeDomain],
        host: &str,
    ) -> Result<UpdateOutcome, SyncError> {
        if !self.resolver.is_cert_covered(host) {
            return Err(SyncError::AuthorityDenied {
                host: host.to_string(),
            });
        }

        let Some(zone) = find_authoritative_domain(domains, host) else {
            info!(host = %host, "No authoritative domain found for host");
            return Ok(UpdateOutcome::Skipped(SkipReason::NoAuthoritativeZone));
        };
        let relative = relative_record_name(host, &zone.domain);

        let message = message::build_replace_message(
            &zone.domain,
            &relative,
            self.target,
            DNS_RECORD_TTL_SECS,
        )
        .map_err(|e| invalid_record(ChangeAction::Upsert, host, &e))?;

        info!(
            zone = %zone.domain,
            name = %relative,
            target = %self.target,
            ttl = DNS_RECORD_TTL_SECS,
            "Replacing internal A record"
        );

        self.submit(ChangeAction::Upsert, host, message).await
    }

    /// Remove the A records of `host`.
    ///
    /// No certificate check is made so that hosts dropped from the policy
    /// can still be cleaned up. Deleting a record that does not exist
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Provider`] if the primary does not answer `NOERROR`.
    pub async fn delete(
        &self,
        domains: &[AuthoritativeDomain],
        host: &str,
    ) -> Result<UpdateOutcome, SyncError> {
        let Some(zone) = find_authoritative_domain(domains, host) else {
            info!(host = %host, "No authoritative domain found for host");
            return Ok(UpdateOutcome::Skipped(SkipReason::NoAuthoritativeZone));
        };
        let relative = relative_record_name(host, &zone.domain);

        let message = message::build_delete_message(&zone.domain, &relative)
            .map_err(|e| invalid_record(ChangeAction::Delete, host, &e))?;

        info!(zone = %zone.domain, name = %relative, "Deleting internal A record");

        self.submit(ChangeAction::Delete, host, message).await
    }

    async fn submit(
        &self,
        action: ChangeAction,
        host: &str,
        message: Message,
    ) -> Result<UpdateOutcome, SyncError> {
        let start = Instant::now();
        let operation_name = format!("internal {} {host}", action.as_str());

        let result = retry_provider_call(&self.retry, &operation_name, || {
            let transport = Arc::clone(&self.transport);
            let message = message.clone();
            async move {
                match transport.send_update(message).await? {
                    ResponseCode::NoError => Ok(()),
                    code => Err(response_code_error(code)),
                }
            }
        })
        .await;

        metrics::record_dns_change(Provider::Internal, action, result.is_ok(), start.elapsed());

        match result {
            Ok(()) => {
                debug!(host = %host, action = action.as_str(), "Internal DNS change applied");
                Ok(UpdateOutcome::Applied)
            }
            Err(err) => Err(ProviderError {
                provider: Provider::Internal,
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

/// SERVFAIL is worth another attempt; every other refusal is final.
fn response_code_error(code: ResponseCode) -> CallError {
    let error = if code == ResponseCode::ServFail {
        CallError::transient(format!("{code:?}"))
    } else {
        CallError::permanent(format!("{code:?}"))
    };
    error.with_code(format!("{code:?}"))
}

fn invalid_record(action: ChangeAction, host: &str, err: &anyhow::Error) -> SyncError {
    ProviderError {
        provider: Provider::Internal,
        action,
        host: host.to_string(),
        code: None,
        reason: format!("{err:#}"),
        transient: false,
    }
    .into()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
