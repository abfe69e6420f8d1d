// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Admission diff engine.
//!
//! Turns an Ingress admission event into the set of hosts whose A records
//! must be upserted and the set whose records must be deleted. The engine is
//! a pure function of the operation and the old/new Ingress specs; it never
//! talks to a DNS backend.
//!
//! | Operation | upsert | delete |
//! |-----------|--------|--------|
//! | `CREATE`  | hosts(new) | none |
//! | `UPDATE`  | hosts(new) | hosts(old) - hosts(new) |
//! | `DELETE`  | none | hosts(old) |
//! | other     | [`SyncError::UnsupportedOperation`] | |
//!
//! `UPDATE` re-applies every current host, including unchanged ones, so
//! drift introduced out of band is healed on the next edit.

use crate::dns_errors::SyncError;
use k8s_openapi::api::networking::v1::{Ingress, IngressSpec};
use kube::core::admission::Operation;
use std::collections::BTreeSet;
use std::fmt;

/// The kind of change to apply to a host's A record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    /// Create or replace the record
    Upsert,
    /// Remove the record
    Delete,
}

impl ChangeAction {
    /// Lower-case label used for metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }

    /// Verb used in human-readable error messages.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Upsert => "update",
            Self::Delete => "delete",
        }
    }
}

/// A single planned DNS change for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsChangeRequest {
    /// Fully-qualified Ingress host
    pub host: String,
    /// What to do with the host's record
    pub action: ChangeAction,
}

/// Admission operation as far as the diff engine is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOperation {
    /// Object is being created
    Create,
    /// Object is being replaced
    Update,
    /// Object is being removed
    Delete,
    /// Anything else (e.g. `CONNECT`); has no defined diff
    Other(String),
}

impl From<&Operation> for AdmissionOperation {
    fn from(operation: &Operation) -> Self {
        match operation {
            Operation::Create => Self::Create,
            Operation::Update => Self::Update,
            Operation::Delete => Self::Delete,
            Operation::Connect => Self::Other("CONNECT".to_string()),
        }
    }
}

impl fmt::Display for AdmissionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("CREATE"),
            Self::Update => f.write_str("UPDATE"),
            Self::Delete => f.write_str("DELETE"),
            Self::Other(operation) => f.write_str(operation),
        }
    }
}

/// Hosts to upsert and hosts to delete for one admission event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressDiff {
    /// Hosts whose record must point at the configured targets
    pub upsert_hosts: BTreeSet<String>,
    /// Hosts whose record must be removed
    pub delete_hosts: BTreeSet<String>,
}

impl IngressDiff {
    /// True if the event requires no DNS change at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upsert_hosts.is_empty() && self.delete_hosts.is_empty()
    }

    /// Flatten into change requests: all deletions first, then all upserts.
    #[must_use]
    pub fn changes(&self) -> Vec<DnsChangeRequest> {
        let deletes = self.delete_hosts.iter().map(|host| DnsChangeRequest {
            host: host.clone(),
            action: ChangeAction::Delete,
        });
        let upserts = self.upsert_hosts.iter().map(|host| DnsChangeRequest {
            host: host.clone(),
            action: ChangeAction::Upsert,
        });

        deletes.chain(upserts).collect()
    }
}

/// Collect the hosts of every rule in an Ingress spec.
///
/// Rules without a host (catch-all rules) carry no DNS name and are skipped.
#[must_use]
pub fn ingress_hosts(spec: Option<&IngressSpec>) -> BTreeSet<String> {
    spec.and_then(|spec| spec.rules.as_ref())
        .map(|rules| {
            rules
                .iter()
                .filter_map(|rule| rule.host.clone())
                .filter(|host| !host.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Compute the DNS diff for an Ingress admission event.
///
/// # Errors
///
/// Returns [`SyncError::UnsupportedOperation`] for operations without a
/// defined diff. It never panics.
pub fn compute_diff(
    operation: &AdmissionOperation,
    new_spec: Option<&IngressSpec>,
    old_spec: Option<&IngressSpec>,
) -> Result<IngressDiff, SyncError> {
    match operation {
        AdmissionOperation::Create => Ok(IngressDiff {
            upsert_hosts: ingress_hosts(new_spec),
            delete_hosts: BTreeSet::new(),
        }),
        AdmissionOperation::Delete => Ok(IngressDiff {
            upsert_hosts: BTreeSet::new(),
            delete_hosts: ingress_hosts(old_spec),
        }),
        AdmissionOperation::Update => {
            let new_hosts = ingress_hosts(new_spec);
            let delete_hosts = ingress_hosts(old_spec)
                .difference(&new_hosts)
                .cloned()
                .collect();

            Ok(IngressDiff {
                upsert_hosts: new_hosts,
                delete_hosts,
            })
        }
        AdmissionOperation::Other(operation) => Err(SyncError::UnsupportedOperation {
            operation: operation.clone(),
        }),
    }
}

/// Compute the cleanup diff for a namespace that is being deleted.
///
/// Every host of every Ingress in the namespace is scheduled for deletion.
#[must_use]
pub fn namespace_cleanup_diff(ingresses: &[Ingress]) -> IngressDiff {
    IngressDiff {
        upsert_hosts: BTreeSet::new(),
        delete_hosts: ingresses
            .iter()
            .flat_map(|ingress| ingress_hosts(ingress.spec.as_ref()))
            .collect(),
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
