// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Recording fakes shared by the unit tests.

use async_trait::async_trait;
use hickory_client::op::{Message, ResponseCode};
use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::bind9::UpdateTransport;
use crate::diff::ChangeAction;
use crate::dns_errors::SyncError;
use crate::domains::{AuthoritativeDomain, DomainSource};
use crate::kubernetes::IngressSource;
use crate::policy::{AuthorityEntry, AuthorityPolicy, ZoneAuthorityResolver};
use crate::retry::{CallError, RetryPolicy};
use crate::route53::{ExternalHostedZone, HostedZoneProvider};

/// Retry policy that never sleeps noticeably.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempt_timeout: Duration::from_millis(200),
        max_attempts: 3,
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(2),
        max_elapsed_time: Duration::from_secs(5),
    }
}

fn entry(zone: &str, names: &[&str], apex_covered: bool) -> AuthorityEntry {
    AuthorityEntry {
        zone: zone.to_string(),
        name_patterns: names.iter().map(ToString::to_string).collect(),
        apex_covered,
    }
}

/// Certificate covers `*.{zone}` (and the apex if asked); nothing is exposed.
pub fn covering_resolver(zone: &str, apex_covered: bool) -> ZoneAuthorityResolver {
    exposing_resolver(zone, apex_covered, &[])
}

/// Certificate covers `*.{zone}`; `exposed` names of the zone are published.
pub fn exposing_resolver(zone: &str, apex_covered: bool, exposed: &[&str]) -> ZoneAuthorityResolver {
    let exposure = if exposed.is_empty() {
        AuthorityPolicy::default()
    } else {
        AuthorityPolicy::new(vec![entry(zone, exposed, false)]).unwrap()
    };

    ZoneAuthorityResolver::new(
        AuthorityPolicy::new(vec![entry(zone, &["*"], apex_covered)]).unwrap(),
        exposure,
    )
}

/// Ingress with one rule per host.
pub fn ingress(namespace: &str, name: &str, hosts: &[&str]) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ingress_spec(hosts)),
        status: None,
    }
}

pub fn ingress_spec(hosts: &[&str]) -> IngressSpec {
    IngressSpec {
        rules: Some(
            hosts
                .iter()
                .map(|host| IngressRule {
                    host: Some((*host).to_string()),
                    http: None,
                })
                .collect(),
        ),
        ..Default::default()
    }
}

/// Records every UPDATE and answers from a queue (NOERROR once it is empty).
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Message>>,
    responses: Mutex<VecDeque<Result<ResponseCode, CallError>>>,
}

impl RecordingTransport {
    pub fn with_responses(responses: Vec<Result<ResponseCode, CallError>>) -> Self {
        Self {
            sent: Mutex::default(),
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateTransport for RecordingTransport {
    async fn send_update(&self, message: Message) -> Result<ResponseCode, CallError> {
        self.sent.lock().unwrap().push(message);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ResponseCode::NoError))
    }
}

/// One change submitted to [`RecordingZoneProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChange {
    pub zone_id: String,
    pub action: ChangeAction,
    pub name: String,
    pub value: Ipv4Addr,
}

/// Serves a fixed zone list and records every change.
#[derive(Default)]
pub struct RecordingZoneProvider {
    zones: Vec<ExternalHostedZone>,
    list_error: Option<CallError>,
    change_responses: Mutex<VecDeque<Result<String, CallError>>>,
    changes: Mutex<Vec<RecordedChange>>,
    list_calls: AtomicUsize,
}

impl RecordingZoneProvider {
    pub fn with_zones(zones: Vec<ExternalHostedZone>) -> Self {
        Self {
            zones,
            ..Default::default()
        }
    }

    pub fn failing_list(error: CallError) -> Self {
        Self {
            list_error: Some(error),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_change_responses(self, responses: Vec<Result<String, CallError>>) -> Self {
        Self {
            change_responses: Mutex::new(responses.into()),
            ..self
        }
    }

    pub fn changes(&self) -> Vec<RecordedChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostedZoneProvider for RecordingZoneProvider {
    async fn list_hosted_zones(&self) -> Result<Vec<ExternalHostedZone>, CallError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.list_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.zones.clone()),
        }
    }

    async fn change_a_record(
        &self,
        zone_id: &str,
        action: ChangeAction,
        name: &str,
        value: Ipv4Addr,
    ) -> Result<String, CallError> {
        self.changes.lock().unwrap().push(RecordedChange {
            zone_id: zone_id.to_string(),
            action,
            name: name.to_string(),
            value,
        });
        self.change_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("/change/C1".to_string()))
    }
}

/// Fixed authoritative domain list, or a store that is down.
pub struct StaticDomainSource(pub Result<Vec<AuthoritativeDomain>, SyncError>);

impl StaticDomainSource {
    pub fn new(domains: &[&str]) -> Self {
        Self(Ok(domains
            .iter()
            .map(|domain| AuthoritativeDomain::new(*domain))
            .collect()))
    }
}

#[async_trait]
impl DomainSource for StaticDomainSource {
    async fn authoritative_domains(&self) -> Result<Vec<AuthoritativeDomain>, SyncError> {
        self.0.clone()
    }
}

/// Fixed Ingress inventory.
#[derive(Default)]
pub struct StaticIngressSource {
    pub ingresses: Vec<Ingress>,
    pub unavailable: bool,
}

impl StaticIngressSource {
    fn check(&self) -> Result<(), SyncError> {
        if self.unavailable {
            return Err(SyncError::SourceUnavailable {
                source_name: "ingresses",
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IngressSource for StaticIngressSource {
    async fn namespace_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, SyncError> {
        self.check()?;
        Ok(self
            .ingresses
            .iter()
            .filter(|ingress| ingress.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn all_ingresses(&self) -> Result<Vec<Ingress>, SyncError> {
        self.check()?;
        Ok(self.ingresses.clone())
    }
}
