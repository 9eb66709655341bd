// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hostname → VM bindings published as Kubernetes `ConfigMap`s.
//!
//! A binding `ConfigMap` carries `VM_NAME`, `STATUS` and `URL` keys. Only
//! deployed VMs contribute a binding.

use std::fmt::Debug;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{api::ListParams, Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::constants::{
    KUBE_LIST_PAGE_SIZE, REGISTRY_KEY_STATUS, REGISTRY_KEY_URL, REGISTRY_KEY_VM_NAME,
    REGISTRY_STATUS_DEPLOYED,
};
use crate::cycle::RegistrySource;
use crate::model::RegistryMap;

/// Build a Kubernetes client from an explicit kubeconfig, or the default chain.
///
/// # Errors
///
/// Returns an error if the kubeconfig cannot be read or no config is found.
pub async fn kube_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Client::try_default()
            .await
            .context("Failed to infer Kubernetes client configuration");
    };

    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .with_context(|| format!("Invalid kubeconfig {}", path.display()))?;

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// List all resources, one page at a time.
///
/// # Errors
///
/// Returns an error if any page request fails.
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

        match result.metadata.continue_ {
            Some(token) if !token.is_empty() => list_params.continue_token = Some(token),
            _ => break,
        }
    }

    Ok(all_items)
}

/// Turn binding `ConfigMap`s into the registry map.
///
/// `ConfigMap`s are visited ordered by `namespace/name`; when two of them
/// claim the same URL the later one wins.
#[must_use]
pub fn bindings_from_configmaps(configmaps: &[ConfigMap]) -> RegistryMap {
    let mut ordered: Vec<&ConfigMap> = configmaps.iter().collect();
    ordered.sort_by_key(|cm| (cm.namespace().unwrap_or_default(), cm.name_any()));

    let mut bindings = RegistryMap::new();

    for cm in ordered {
        let id = format!("{}/{}", cm.namespace().unwrap_or_default(), cm.name_any());
        let Some(data) = cm.data.as_ref() else {
            debug!(configmap = %id, "No data, skipping");
            continue;
        };

        let Some(vm_name) = data.get(REGISTRY_KEY_VM_NAME) else {
            warn!(configmap = %id, "Missing {REGISTRY_KEY_VM_NAME}, skipping");
            continue;
        };

        let status = data.get(REGISTRY_KEY_STATUS).map(String::as_str);
        if status != Some(REGISTRY_STATUS_DEPLOYED) {
            debug!(configmap = %id, vm = %vm_name, status = ?status, "VM not deployed, skipping");
            continue;
        }

        let Some(url) = data.get(REGISTRY_KEY_URL).filter(|u| !u.is_empty()) else {
            warn!(configmap = %id, vm = %vm_name, "Missing {REGISTRY_KEY_URL}, skipping");
            continue;
        };

        if let Some(previous) = bindings.insert(url.clone(), vm_name.clone()) {
            warn!(
                configmap = %id,
                url = %url,
                previous_vm = %previous,
                vm = %vm_name,
                "Duplicate URL binding, keeping the later one"
            );
        }
    }

    bindings
}

/// Registry backed by labelled `ConfigMap`s across all namespaces.
#[derive(Clone)]
pub struct KubeRegistry {
    api: Api<ConfigMap>,
    label_selector: String,
}

impl KubeRegistry {
    #[must_use]
    pub fn new(client: Client, label_selector: impl Into<String>) -> Self {
        Self {
            api: Api::all(client),
            label_selector: label_selector.into(),
        }
    }
}

#[async_trait]
impl RegistrySource for KubeRegistry {
    async fn fetch_registry_bindings(&self) -> Result<RegistryMap> {
        let params = ListParams::default().labels(&self.label_selector);
        let configmaps = list_all_paginated(&self.api, params)
            .await
            .with_context(|| {
                format!(
                    "Failed to list ConfigMaps with selector {}",
                    self.label_selector
                )
            })?;

        let bindings = bindings_from_configmaps(&configmaps);
        info!(
            configmaps = configmaps.len(),
            bindings = bindings.len(),
            "Loaded registry bindings"
        );

        Ok(bindings)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
