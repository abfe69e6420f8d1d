// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress listings from the Kubernetes API.
//!
//! Used by namespace cleanup (Ingresses of one namespace) and by the full
//! resync pass (Ingresses of every namespace). Listings are paginated to
//! keep API server load bounded on large clusters.

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{api::ListParams, Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

use crate::constants::KUBE_LIST_PAGE_SIZE;
use crate::dns_errors::SyncError;

/// List all resources with automatic pagination.
///
/// # Errors
///
/// Returns an error if Kubernetes API operations fail.
pub async fn list_all_paginated<K>(api: &Api<K>, mut list_params: ListParams) -> Result<Vec<K>>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    list_params.limit = Some(KUBE_LIST_PAGE_SIZE);

    let mut all_items = Vec::new();
    let mut page_count = 0;

    loop {
        page_count += 1;
        let result = api.list(&list_params).await?;

        let item_count = result.items.len();
        all_items.extend(result.items);

        debug!(
            page = page_count,
            items_in_page = item_count,
            total_items = all_items.len(),
            "Fetched page from Kubernetes API"
        );

        match result.metadata.continue_.filter(|token| !token.is_empty()) {
            Some(continue_token) => list_params.continue_token = Some(continue_token),
            None => break,
        }
    }

    Ok(all_items)
}

/// Where the controller reads current Ingress objects from.
#[async_trait]
pub trait IngressSource: Send + Sync {
    /// Every Ingress in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SourceUnavailable`] if the listing fails.
    async fn namespace_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, SyncError>;

    /// Every Ingress in the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SourceUnavailable`] if the listing fails.
    async fn all_ingresses(&self) -> Result<Vec<Ingress>, SyncError>;
}

/// [`IngressSource`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeIngressSource {
    client: Client,
}

impl KubeIngressSource {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn listing_failed(err: &anyhow::Error) -> SyncError {
    SyncError::SourceUnavailable {
        source_name: "ingresses",
        reason: format!("{err:#}"),
    }
}

#[async_trait]
impl IngressSource for KubeIngressSource {
    async fn namespace_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, SyncError> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        list_all_paginated(&api, ListParams::default())
            .await
            .map_err(|e| listing_failed(&e))
    }

    async fn all_ingresses(&self) -> Result<Vec<Ingress>, SyncError> {
        let api: Api<Ingress> = Api::all(self.client.clone());
        list_all_paginated(&api, ListParams::default())
            .await
            .map_err(|e| listing_failed(&e))
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
