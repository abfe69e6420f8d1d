// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Namespace deletion admission hook.

use std::sync::Arc;

use axum::{extract::State, Json};
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use tracing::{debug, error, info};

use super::{respond, within_deadline, WebhookState};
use crate::metrics;

const HOOK: &str = "delete-namespace";

/// Handle a Namespace DELETE review by removing the DNS records of every
/// Ingress in the namespace
pub async fn delete_namespace_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = cleanup_namespace(&state, &req).await;
    metrics::record_admission_review(HOOK, response.allowed);
    Json(response.into_review())
}

/// Name of the namespace under review.
///
/// The API server fills `namespace` with the namespace's own name; `name`
/// carries it as well since the object is cluster scoped.
#[must_use]
pub fn reviewed_namespace(request: &AdmissionRequest<DynamicObject>) -> &str {
    request
        .namespace
        .as_deref()
        .filter(|namespace| !namespace.is_empty())
        .unwrap_or(&request.name)
}

async fn cleanup_namespace(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let uid = &request.uid;

    let Some(reconciler) = &state.reconciler else {
        debug!(uid = %uid, "Internal DNS provider not configured, allowing unchanged");
        return AdmissionResponse::from(request);
    };

    let namespace = reviewed_namespace(request);
    let cleanup = reconciler.cleanup_namespace(namespace);
    let decision = match within_deadline(request, state.deadline, cleanup).await {
        Ok(decision) => decision,
        Err(response) => return response,
    };

    info!(
        uid = %uid,
        namespace = %namespace,
        allowed = decision.is_allowed(),
        "Reviewed namespace deletion"
    );

    respond(request, &decision)
}
