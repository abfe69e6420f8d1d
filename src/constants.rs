// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the ingress DNS controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for dynamic updates over TCP
pub const DNS_PORT: u16 = 53;

/// TTL for every A record this controller writes (5 minutes)
pub const DNS_RECORD_TTL_SECS: u32 = 300;

/// Name of the pre-shared TSIG key accepted by the internal BIND9 primary
pub const TSIG_KEY_NAME: &str = "internal.";

/// TSIG fudge time in seconds (allows for clock skew)
pub const TSIG_FUDGE_TIME_SECS: u16 = 300;

/// Relative record name that designates the zone apex
pub const APEX_RECORD_NAME: &str = "@";

// ============================================================================
// Provider Retry Constants
// ============================================================================

/// Default per-attempt timeout for a single provider call
pub const DEFAULT_DNS_TIMEOUT_MS: u64 = 1_000;

/// Default number of attempts for a single provider call (first try included)
pub const DEFAULT_DNS_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff between provider attempts
pub const PROVIDER_INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum backoff between provider attempts
pub const PROVIDER_MAX_INTERVAL_MILLIS: u64 = 1_000;

/// Upper bound on the total time spent on one provider call, attempts included
pub const PROVIDER_MAX_ELAPSED_MILLIS: u64 = 2_500;

/// Time a single admission review may spend applying DNS changes.
///
/// Kept below the 10 second default admission webhook timeout so the review
/// is answered before the API server gives up on it.
pub const ADMISSION_DEADLINE_MILLIS: u64 = 9_000;

// ============================================================================
// Configuration Defaults
// ============================================================================

/// Default path of the certificate coverage policy
pub const DEFAULT_CERT_ENTRIES_PATH: &str = "/etc/controller-conf/cluster_cert_entries.json";

/// Default path of the external exposure policy
pub const DEFAULT_EXTERNAL_DOMAINS_PATH: &str = "/etc/controller-conf/external_domains.json";

/// Query returning the zones the internal BIND9 server is authoritative for
pub const BIND_DOMAINS_QUERY: &str = "SELECT domain FROM bind_domains";

/// Maximum number of pooled connections to the relational store
pub const DOMAIN_STORE_MAX_CONNECTIONS: u32 = 4;

/// How long to wait for a pooled connection before failing the request
pub const DOMAIN_STORE_ACQUIRE_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Webhook Server Constants
// ============================================================================

/// Default bind address for the admission webhook (HTTPS)
pub const WEBHOOK_BIND_ADDRESS: &str = "0.0.0.0:443";

/// Default TLS certificate for the admission webhook
pub const WEBHOOK_TLS_CERT_PATH: &str = "/etc/tls/tls.crt";

/// Default TLS private key for the admission webhook
pub const WEBHOOK_TLS_KEY_PATH: &str = "/etc/tls/tls.key";

/// Path of the ingress DNS admission hook
pub const INGRESS_DNS_PATH: &str = "/ingress-dns";

/// Path of the namespace deletion admission hook
pub const DELETE_NAMESPACE_PATH: &str = "/delete-namespace";

/// Liveness endpoint
pub const HEALTHZ_PATH: &str = "/healthz";

/// Status reason attached to denied admission responses
pub const DENIAL_REASON: &str = "InternalError";

/// Status code attached to denied admission responses
pub const DENIAL_CODE: u16 = 500;

// ============================================================================
// Resync Constants
// ============================================================================

/// Default interval between full resync passes (5 minutes)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Page size for cluster-wide Ingress listings
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the Prometheus metrics server (plain HTTP)
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0:9090";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
