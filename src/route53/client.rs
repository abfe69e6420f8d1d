// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hosted-zone provider seam and its Route53 implementation.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_route53::config::Credentials;
use aws_sdk_route53::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_route53::types::{
    Change, ChangeAction as Route53Action, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53::Client;
use std::net::Ipv4Addr;
use tracing::debug;

use crate::constants::DNS_RECORD_TTL_SECS;
use crate::diff::ChangeAction;
use crate::retry::CallError;

/// Error codes Route53 uses for conditions that clear up on their own.
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "PriorRequestNotComplete",
    "ServiceUnavailable",
    "RequestTimeout",
];

/// A hosted zone as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalHostedZone {
    /// Fully-qualified zone name, with trailing dot (e.g. `example.com.`)
    pub name: String,
    /// Opaque provider identifier (e.g. `/hostedzone/Z123`)
    pub id: String,
}

impl ExternalHostedZone {
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// External DNS provider operations the updater needs.
#[async_trait]
pub trait HostedZoneProvider: Send + Sync {
    /// Every hosted zone of the account.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] if the listing fails.
    async fn list_hosted_zones(&self) -> Result<Vec<ExternalHostedZone>, CallError>;

    /// Submit a single-change batch for the A record `name` in `zone_id`.
    ///
    /// Returns the provider's change id.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] carrying the provider's error code and payload.
    async fn change_a_record(
        &self,
        zone_id: &str,
        action: ChangeAction,
        name: &str,
        value: Ipv4Addr,
    ) -> Result<String, CallError>;
}

/// Connection settings for Route53.
#[derive(Clone)]
pub struct Route53Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// Override for the API endpoint (e.g. a local emulator)
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for Route53Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route53Settings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// [`HostedZoneProvider`] backed by the AWS Route53 API.
#[derive(Debug, Clone)]
pub struct Route53Provider {
    client: Client,
}

impl Route53Provider {
    /// Build an SDK client from explicit static credentials.
    pub async fn connect(settings: &Route53Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "ingressdns",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint_url) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let shared_config = loader.load().await;

        Self {
            client: Client::new(&shared_config),
        }
    }
}

#[async_trait]
impl HostedZoneProvider for Route53Provider {
    async fn list_hosted_zones(&self) -> Result<Vec<ExternalHostedZone>, CallError> {
        let mut zones = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_hosted_zones()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(classify_sdk_error)?;

            zones.extend(
                output
                    .hosted_zones()
                    .iter()
                    .map(|zone| ExternalHostedZone::new(zone.name(), zone.id())),
            );

            match output.next_marker() {
                Some(next) if output.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(count = zones.len(), "Listed hosted zones");
        Ok(zones)
    }

    async fn change_a_record(
        &self,
        zone_id: &str,
        action: ChangeAction,
        name: &str,
        value: Ipv4Addr,
    ) -> Result<String, CallError> {
        let change_batch = build_change_batch(action, name, value)?;

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(change_batch)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(output
            .change_info()
            .map(|info| info.id().to_string())
            .unwrap_or_default())
    }
}

/// Single-change batch for one A record with the standard TTL.
///
/// # Errors
///
/// Returns a permanent [`CallError`] if a required field is missing.
pub fn build_change_batch(
    action: ChangeAction,
    name: &str,
    value: Ipv4Addr,
) -> Result<ChangeBatch, CallError> {
    let action = match action {
        ChangeAction::Upsert => Route53Action::Upsert,
        ChangeAction::Delete => Route53Action::Delete,
    };

    let record = ResourceRecord::builder()
        .value(value.to_string())
        .build()
        .map_err(build_error)?;
    let record_set = ResourceRecordSet::builder()
        .name(name)
        .r#type(RrType::A)
        .ttl(i64::from(DNS_RECORD_TTL_SECS))
        .resource_records(record)
        .build()
        .map_err(build_error)?;
    let change = Change::builder()
        .action(action)
        .resource_record_set(record_set)
        .build()
        .map_err(build_error)?;

    ChangeBatch::builder()
        .changes(change)
        .build()
        .map_err(build_error)
}

fn build_error(err: impl std::fmt::Display) -> CallError {
    CallError::permanent(format!("Invalid change batch: {err}"))
}

/// Map an SDK failure to a [`CallError`], keeping the provider's error code.
///
/// Dispatch failures, timeouts and throttling are transient; everything the
/// service rejected on its merits (e.g. `InvalidChangeBatch`) is permanent.
fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> CallError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let code = err.code().map(ToString::to_string);

    let transient = match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(_) => code
            .as_deref()
            .is_some_and(|code| TRANSIENT_ERROR_CODES.contains(&code)),
        _ => false,
    };

    let error = if transient {
        CallError::transient(message)
    } else {
        CallError::permanent(message)
    };

    match code {
        Some(code) => error.with_code(code),
        None => error,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
