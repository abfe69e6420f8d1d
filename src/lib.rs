// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # ingressdns - Ingress DNS controller for Kubernetes
//!
//! Keeps DNS A records for Ingress hostnames in step with the cluster in two
//! independent authorities:
//!
//! - an internal BIND9 primary, updated with TSIG-signed RFC 2136 dynamic
//!   updates
//! - an optional external Route53 account, updated with change batches
//!
//! Ingress changes whose hosts are not covered by the cluster certificate are
//! refused at admission time.
//!
//! ## Modules
//!
//! - [`policy`] - Certificate coverage and exposure matching
//! - [`diff`] - Turning admission events into per-host changes
//! - [`bind9`] - Internal DNS updates
//! - [`route53`] - External DNS updates
//! - [`reconcile`] - Admission and resync drivers
//! - [`webhook`] - Admission webhook endpoints
//! - [`config`] - Command line and environment settings
//!
//! ## Example
//!
//! ```rust
//! use ingressdns::diff::{compute_diff, AdmissionOperation};
//! use k8s_openapi::api::networking::v1::{IngressRule, IngressSpec};
//!
//! let spec = IngressSpec {
//!     rules: Some(vec![IngressRule {
//!         host: Some("app.example.com".to_string()),
//!         http: None,
//!     }]),
//!     ..Default::default()
//! };
//!
//! let diff = compute_diff(&AdmissionOperation::Create, Some(&spec), None).unwrap();
//! assert!(diff.upsert_hosts.contains("app.example.com"));
//! ```

pub mod bind9;
pub mod config;
pub mod constants;
pub mod diff;
pub mod dns_errors;
pub mod domains;
pub mod kubernetes;
pub mod metrics;
pub mod policy;
pub mod reconcile;
pub mod retry;
pub mod route53;
pub mod webhook;

#[cfg(test)]
mod testing;
