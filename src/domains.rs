// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authoritative domains of the internal DNS server.
//!
//! The set of zones the internal primary may be updated for lives in the
//! `bind_domains` table of the platform database. It is read fresh for every
//! admission request and every resync pass; nothing is cached across them.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::debug;

use crate::constants::{
    BIND_DOMAINS_QUERY, DOMAIN_STORE_ACQUIRE_TIMEOUT_SECS, DOMAIN_STORE_MAX_CONNECTIONS,
};
use crate::dns_errors::SyncError;

/// A zone the internal DNS server is authoritative for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeDomain {
    /// Zone name without trailing dot, e.g. `example.com`
    pub domain: String,
}

impl AuthoritativeDomain {
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

/// Source of the current authoritative domain list.
///
/// Order is significant: the internal updater picks the first domain that is
/// a suffix of the host.
#[async_trait]
pub trait DomainSource: Send + Sync {
    /// Read the current list.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SourceUnavailable`] if the store cannot be read.
    async fn authoritative_domains(&self) -> Result<Vec<AuthoritativeDomain>, SyncError>;
}

/// Reads authoritative domains from PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgDomainSource {
    pool: PgPool,
}

impl PgDomainSource {
    /// Create a lazily connecting pool; no connection is opened until the
    /// first query.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed.
    pub fn connect_lazy(conn_str: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(DOMAIN_STORE_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(DOMAIN_STORE_ACQUIRE_TIMEOUT_SECS))
            .connect_lazy(conn_str)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DomainSource for PgDomainSource {
    async fn authoritative_domains(&self) -> Result<Vec<AuthoritativeDomain>, SyncError> {
        let domains = sqlx::query_scalar::<_, String>(BIND_DOMAINS_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SyncError::SourceUnavailable {
                source_name: "authoritative domains",
                reason: e.to_string(),
            })?;

        debug!(count = domains.len(), "Loaded authoritative domains");

        Ok(domains.into_iter().map(AuthoritativeDomain::new).collect())
    }
}
