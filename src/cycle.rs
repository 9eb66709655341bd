// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! One reconciliation cycle: fetch, triage, sync.
//!
//! A cycle always starts cold. The three collaborators are fetched in order
//! (hypervisor, zone, registry); any fetch failure aborts the cycle before
//! triage with [`SyncError::CollaboratorUnavailable`].

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::SyncError;
use crate::metrics;
use crate::model::{LiveMap, RegistryMap, ZoneMap};
use crate::sync::{SyncReport, ZoneSynchronizer, ZoneWriter};
use crate::triage::triage;

/// Source of the hypervisor inventory (VM name → IP).
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the hypervisor cannot be queried.
    async fn fetch_live_inventory(&self) -> anyhow::Result<LiveMap>;
}

/// Source of registry bindings (hostname → VM name).
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the registry cannot be listed.
    async fn fetch_registry_bindings(&self) -> anyhow::Result<RegistryMap>;
}

/// Source of the published zone (hostname → IP), address records only.
#[async_trait]
pub trait ZoneSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the zone cannot be listed.
    async fn fetch_zone_records(&self) -> anyhow::Result<ZoneMap>;
}

/// Run a single reconciliation cycle.
///
/// The outcome is also recorded in the cycle metrics.
///
/// # Errors
///
/// Returns any [`SyncError`] produced by the fetch or sync phases.
pub async fn run_cycle<I, R, Z, W>(
    inventory: &I,
    registry: &R,
    zone: &Z,
    writer: &W,
    synchronizer: &ZoneSynchronizer,
) -> Result<SyncReport, SyncError>
where
    I: InventorySource + ?Sized,
    R: RegistrySource + ?Sized,
    Z: ZoneSource + ?Sized,
    W: ZoneWriter + ?Sized,
{
    let start = Instant::now();
    let result = run_cycle_inner(inventory, registry, zone, writer, synchronizer).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.reason(),
    };
    metrics::record_cycle(outcome, start.elapsed());

    result
}

async fn run_cycle_inner<I, R, Z, W>(
    inventory: &I,
    registry: &R,
    zone: &Z,
    writer: &W,
    synchronizer: &ZoneSynchronizer,
) -> Result<SyncReport, SyncError>
where
    I: InventorySource + ?Sized,
    R: RegistrySource + ?Sized,
    Z: ZoneSource + ?Sized,
    W: ZoneWriter + ?Sized,
{
    let live = inventory
        .fetch_live_inventory()
        .await
        .map_err(|e| SyncError::unavailable("hypervisor", &e))?;
    debug!(vms = live.len(), "Fetched hypervisor inventory");

    let published = zone
        .fetch_zone_records()
        .await
        .map_err(|e| SyncError::unavailable("zone", &e))?;
    debug!(records = published.len(), "Fetched zone records");

    let bindings = registry
        .fetch_registry_bindings()
        .await
        .map_err(|e| SyncError::unavailable("registry", &e))?;
    debug!(bindings = bindings.len(), "Fetched registry bindings");

    let summaries = triage(&live, &published, &bindings);
    info!(
        vms = live.len(),
        records = published.len(),
        bindings = bindings.len(),
        hostnames = summaries.len(),
        "Triage complete"
    );

    synchronizer.sync(&summaries, writer).await
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod cycle_tests;
