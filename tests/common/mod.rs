// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use hickory_client::op::{Message, ResponseCode, UpdateMessage};
use http_body_util::BodyExt;
use ingressdns::bind9::{InternalDnsUpdater, UpdateTransport};
use ingressdns::diff::ChangeAction;
use ingressdns::dns_errors::SyncError;
use ingressdns::domains::{AuthoritativeDomain, DomainSource};
use ingressdns::kubernetes::IngressSource;
use ingressdns::policy::{AuthorityEntry, AuthorityPolicy, ZoneAuthorityResolver};
use ingressdns::reconcile::IngressDnsReconciler;
use ingressdns::retry::{CallError, RetryPolicy};
use ingressdns::route53::{ExternalDnsUpdater, ExternalHostedZone, HostedZoneProvider};
use k8s_openapi::api::networking::v1::Ingress;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const INTERNAL_TARGET: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const FORWARDED_IP: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 7);

/// Internal DNS primary that records every UPDATE
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Message>>,
    responses: Mutex<VecDeque<ResponseCode>>,
    latency: Duration,
}

impl RecordingTransport {
    pub fn answering(responses: Vec<ResponseCode>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// Primary that takes `latency` to answer each update
    pub fn slow(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Owner name of the last update record of every message sent
    pub fn updated_names(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|message| message.updates().last())
            .map(|record| record.name().to_string())
            .collect()
    }
}

#[async_trait]
impl UpdateTransport for RecordingTransport {
    async fn send_update(&self, message: Message) -> Result<ResponseCode, CallError> {
        tokio::time::sleep(self.latency).await;
        self.sent.lock().unwrap().push(message);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ResponseCode::NoError))
    }
}

/// Route53 account with one hosted zone that records every change
#[derive(Default)]
pub struct RecordingZoneProvider {
    changes: Mutex<Vec<(ChangeAction, String)>>,
}

impl RecordingZoneProvider {
    pub fn changes(&self) -> Vec<(ChangeAction, String)> {
        self.changes.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostedZoneProvider for RecordingZoneProvider {
    async fn list_hosted_zones(&self) -> Result<Vec<ExternalHostedZone>, CallError> {
        Ok(vec![ExternalHostedZone::new("example.com.", "/hostedzone/Z1")])
    }

    async fn change_a_record(
        &self,
        _zone_id: &str,
        action: ChangeAction,
        name: &str,
        _value: Ipv4Addr,
    ) -> Result<String, CallError> {
        self.changes
            .lock()
            .unwrap()
            .push((action, name.to_string()));
        Ok("/change/C1".to_string())
    }
}

pub struct StaticDomains(pub Vec<&'static str>);

#[async_trait]
impl DomainSource for StaticDomains {
    async fn authoritative_domains(&self) -> Result<Vec<AuthoritativeDomain>, SyncError> {
        Ok(self.0.iter().map(|domain| AuthoritativeDomain::new(*domain)).collect())
    }
}

pub struct StaticIngresses(pub Vec<Ingress>);

#[async_trait]
impl IngressSource for StaticIngresses {
    async fn namespace_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, SyncError> {
        Ok(self
            .0
            .iter()
            .filter(|ingress| ingress.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn all_ingresses(&self) -> Result<Vec<Ingress>, SyncError> {
        Ok(self.0.clone())
    }
}

/// Everything a webhook test needs to inspect
pub struct Harness {
    pub reconciler: Arc<IngressDnsReconciler>,
    pub transport: Arc<RecordingTransport>,
    pub zones: Arc<RecordingZoneProvider>,
}

/// Certificate covers `*.example.com`; only `public.example.com` is exposed
pub fn harness(transport: RecordingTransport, ingresses: Vec<Ingress>) -> Harness {
    let cert = AuthorityPolicy::new(vec![AuthorityEntry {
        zone: "example.com".to_string(),
        name_patterns: vec!["*".to_string()],
        apex_covered: true,
    }])
    .unwrap();
    let exposure = AuthorityPolicy::new(vec![AuthorityEntry {
        zone: "example.com".to_string(),
        name_patterns: vec!["public".to_string()],
        apex_covered: false,
    }])
    .unwrap();
    let resolver = Arc::new(ZoneAuthorityResolver::new(cert, exposure));

    let retry = RetryPolicy {
        attempt_timeout: Duration::from_millis(200),
        max_attempts: 2,
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(2),
        max_elapsed_time: Duration::from_secs(2),
    };

    let transport = Arc::new(transport);
    let zones = Arc::new(RecordingZoneProvider::default());
    let reconciler = IngressDnsReconciler::new(
        Arc::new(StaticDomains(vec!["example.com"])),
        Arc::new(StaticIngresses(ingresses)),
        InternalDnsUpdater::new(resolver.clone(), transport.clone(), INTERNAL_TARGET, retry.clone()),
        ExternalDnsUpdater::new(resolver, zones.clone(), FORWARDED_IP, retry),
    );

    Harness {
        reconciler: Arc::new(reconciler),
        transport,
        zones,
    }
}

/// Ingress object as the API server sends it in a review
pub fn ingress_object(namespace: &str, name: &str, hosts: &[&str]) -> Value {
    let rules: Vec<Value> = hosts.iter().map(|host| json!({"host": host})).collect();
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"rules": rules}
    })
}

pub fn ingress(namespace: &str, name: &str, hosts: &[&str]) -> Ingress {
    serde_json::from_value(ingress_object(namespace, name, hosts)).unwrap()
}

/// Ingress admission review
pub fn ingress_review(operation: &str, object: Value, old_object: Value) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "3f5b8c2e-0d4a-4e0b-9a57-1f2c3d4e5f60",
            "kind": {"group": "networking.k8s.io", "version": "v1", "kind": "Ingress"},
            "resource": {"group": "networking.k8s.io", "version": "v1", "resource": "ingresses"},
            "name": "web",
            "namespace": "team-a",
            "operation": operation,
            "userInfo": {"username": "kubernetes-admin"},
            "object": object,
            "oldObject": old_object,
            "dryRun": false
        }
    })
}

/// Namespace DELETE review
pub fn namespace_review(namespace: &str) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "9c1e7a44-2b6f-4d1a-8e0c-7b5a3f2d1e90",
            "kind": {"group": "", "version": "v1", "kind": "Namespace"},
            "resource": {"group": "", "version": "v1", "resource": "namespaces"},
            "name": namespace,
            "namespace": namespace,
            "operation": "DELETE",
            "userInfo": {"username": "kubernetes-admin"},
            "oldObject": {
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": {"name": namespace}
            },
            "dryRun": false
        }
    })
}

/// POST a review and return the `response` part of the answer
pub async fn post_review(router: Router, path: &str, review: &Value) -> Value {
    let request = Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(review).unwrap()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert!(response.status().is_success());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let answer: Value = serde_json::from_slice(&body).unwrap();
    answer["response"].clone()
}
