// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress DNS admission hook.

use std::sync::Arc;

use axum::{extract::State, Json};
use k8s_openapi::api::networking::v1::IngressSpec;
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use tracing::{debug, error, info};

use super::{deny, respond, within_deadline, WebhookState};
use crate::diff::AdmissionOperation;
use crate::metrics;

const HOOK: &str = "ingress-dns";

/// Handle an Ingress admission review
///
/// Computes the host diff between the old and new object and applies it to
/// both DNS providers. The review is allowed only if every change succeeded.
pub async fn ingress_dns_handler(
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

    let response = review_ingress(&state, &req).await;
    metrics::record_admission_review(HOOK, response.allowed);
    Json(response.into_review())
}

/// Read `spec` of an Ingress carried in a review, if there is one.
///
/// # Errors
///
/// Returns an error if `spec` does not deserialize as an Ingress spec.
pub fn ingress_spec(
    object: Option<&DynamicObject>,
) -> Result<Option<IngressSpec>, serde_json::Error> {
    match object.and_then(|object| object.data.get("spec")) {
        Some(spec) => serde_json::from_value(spec.clone()).map(Some),
        None => Ok(None),
    }
}

async fn review_ingress(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let uid = &request.uid;

    let Some(reconciler) = &state.reconciler else {
        debug!(uid = %uid, "Internal DNS provider not configured, allowing unchanged");
        return AdmissionResponse::from(request);
    };

    let specs = (
        ingress_spec(request.object.as_ref()),
        ingress_spec(request.old_object.as_ref()),
    );
    let (new_spec, old_spec) = match specs {
        (Ok(new_spec), Ok(old_spec)) => (new_spec, old_spec),
        (Err(e), _) | (_, Err(e)) => {
            error!(uid = %uid, error = %e, "Ingress in admission review is malformed");
            return deny(request, format!("Invalid ingress spec: {e}"));
        }
    };

    let operation = AdmissionOperation::from(&request.operation);
    let review = reconciler.review_ingress(&operation, new_spec.as_ref(), old_spec.as_ref());
    let decision = match within_deadline(request, state.deadline, review).await {
        Ok(decision) => decision,
        Err(response) => return response,
    };

    info!(
        uid = %uid,
        operation = %operation,
        namespace = request.namespace.as_deref().unwrap_or_default(),
        ingress = %request.name,
        allowed = decision.is_allowed(),
        "Reviewed ingress"
    );

    respond(request, &decision)
}
