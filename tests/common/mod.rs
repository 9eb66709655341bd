// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Mutex;
use vm_dns_sync::cycle::{InventorySource, RegistrySource, ZoneSource};
use vm_dns_sync::errors::ZoneWriteError;
use vm_dns_sync::model::{LiveMap, PendingChange, RegistryMap, ZoneMap};
use vm_dns_sync::sync::ZoneWriter;

/// Build a string map from literal pairs
pub fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Collaborator serving fixed maps
pub struct StaticSource {
    pub live: LiveMap,
    pub registry: RegistryMap,
    pub zone: ZoneMap,
}

#[async_trait]
impl InventorySource for StaticSource {
    async fn fetch_live_inventory(&self) -> anyhow::Result<LiveMap> {
        Ok(self.live.clone())
    }
}

#[async_trait]
impl RegistrySource for StaticSource {
    async fn fetch_registry_bindings(&self) -> anyhow::Result<RegistryMap> {
        Ok(self.registry.clone())
    }
}

#[async_trait]
impl ZoneSource for StaticSource {
    async fn fetch_zone_records(&self) -> anyhow::Result<ZoneMap> {
        Ok(self.zone.clone())
    }
}

/// Writer recording every batch and failing the listed batch indices
#[derive(Default)]
pub struct RecordingWriter {
    pub batches: Mutex<Vec<Vec<PendingChange>>>,
    pub fail_on: Vec<usize>,
}

impl RecordingWriter {
    pub fn failing(fail_on: Vec<usize>) -> Self {
        Self {
            fail_on,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<PendingChange>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ZoneWriter for RecordingWriter {
    async fn apply_batch(&self, batch: &[PendingChange], _ttl: u32) -> Result<(), ZoneWriteError> {
        let mut batches = self.batches.lock().unwrap();
        let index = batches.len();
        batches.push(batch.to_vec());
        if self.fail_on.contains(&index) {
            return Err(ZoneWriteError::Transport {
                zone: "example.com.".to_string(),
                server: "127.0.0.1:53".to_string(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "vm-dns-sync-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(Box::new(e)),
    }
}
