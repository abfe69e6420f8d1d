// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validating admission webhooks.
//!
//! Two hooks are served:
//!
//! - `POST /ingress-dns` reviews Ingress CREATE, UPDATE and DELETE and keeps
//!   the hosts' DNS records in line before the object is admitted
//! - `POST /delete-namespace` reviews Namespace DELETE and removes the
//!   records of every Ingress in the namespace
//!
//! A request is denied when a DNS change fails, so a broken provider blocks
//! the API operation instead of leaving DNS silently out of date.

pub mod ingress;
pub mod namespace;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse},
};
use tracing::{error, warn};

use crate::constants::{
    ADMISSION_DEADLINE_MILLIS, DELETE_NAMESPACE_PATH, DENIAL_CODE, DENIAL_REASON, HEALTHZ_PATH,
    INGRESS_DNS_PATH, METRICS_SERVER_PATH,
};
use crate::metrics;
use crate::reconcile::{AdmissionDecision, IngressDnsReconciler};

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// `None` when the internal provider is not configured; every review is
    /// then allowed unchanged
    pub reconciler: Option<Arc<IngressDnsReconciler>>,
    /// Time a review may spend on DNS changes before it is denied
    pub deadline: Duration,
}

impl Default for WebhookState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl WebhookState {
    #[must_use]
    pub fn new(reconciler: Option<Arc<IngressDnsReconciler>>) -> Self {
        Self {
            reconciler,
            deadline: Duration::from_millis(ADMISSION_DEADLINE_MILLIS),
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Create the webhook router with both admission endpoints and the health probe
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(INGRESS_DNS_PATH, post(ingress::ingress_dns_handler))
        .route(DELETE_NAMESPACE_PATH, post(namespace::delete_namespace_handler))
        .route(HEALTHZ_PATH, get(healthz))
        .with_state(state)
}

/// Create the plain HTTP router serving Prometheus metrics
pub fn metrics_router() -> Router {
    Router::new().route(METRICS_SERVER_PATH, get(metrics_handler))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Refuse the request with the status Kubernetes shows to the API client.
pub(crate) fn deny(
    request: &AdmissionRequest<DynamicObject>,
    message: impl ToString,
) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request).deny(message);
    response.result.reason = DENIAL_REASON.to_string();
    response.result.code = DENIAL_CODE;
    response
}

/// Run the DNS work of one review, giving up once `deadline` has passed.
///
/// Changes applied before the deadline stay applied; the rest are dropped.
pub(crate) async fn within_deadline(
    request: &AdmissionRequest<DynamicObject>,
    deadline: Duration,
    review: impl std::future::Future<Output = AdmissionDecision>,
) -> Result<AdmissionDecision, AdmissionResponse> {
    tokio::time::timeout(deadline, review).await.map_err(|_| {
        warn!(uid = %request.uid, deadline = ?deadline, "DNS changes did not finish in time");
        deny(
            request,
            format!("Timed out applying DNS changes after {}ms", deadline.as_millis()),
        )
    })
}

/// Turn a reconciler decision into the admission response.
pub(crate) fn respond(
    request: &AdmissionRequest<DynamicObject>,
    decision: &AdmissionDecision,
) -> AdmissionResponse {
    match decision.message() {
        None => AdmissionResponse::from(request),
        Some(message) => deny(request, message),
    }
}
