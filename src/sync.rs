// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Turns triage decisions into batched zone updates.
//!
//! # Protocol
//!
//! 1. Every actionable summary becomes a [`PendingChange`]; names whose
//!    leftmost label exceeds the writer's limit are skipped.
//! 2. An empty change set ends the cycle with [`SyncError::NoPendingChanges`].
//! 3. Dry run ends the cycle with [`SyncError::DryRun`] before any write.
//! 4. Changes are split by [`plan_batches`] and applied strictly in order.
//!    A failed batch is recorded and the next one is still attempted.
//! 5. Any failed batch turns the outcome into [`SyncError::PartialApplyFailure`].
//!
//! All decisions are computed before the first write is issued.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::batch::plan_batches;
use crate::constants::{DEFAULT_DNS_RECORD_TTL_SECS, DEFAULT_UPDATE_BATCH_SIZE, MAX_DNS_LABEL_LENGTH};
use crate::errors::{SyncError, ZoneWriteError};
use crate::metrics;
use crate::model::{leftmost_label_len, zone_record_name, Decision, PendingChange, TriageMap};

/// Knobs consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Maximum number of changes per update batch
    pub batch_size: usize,
    /// Compute changes but never write them
    pub dry_run: bool,
    /// TTL given to every upserted record
    pub record_ttl: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_UPDATE_BATCH_SIZE,
            dry_run: true,
            record_ttl: DEFAULT_DNS_RECORD_TTL_SECS,
        }
    }
}

/// Capability to apply one batch of changes to the zone.
///
/// Implementations must apply a batch as a single provider-level transaction.
#[async_trait]
pub trait ZoneWriter: Send + Sync {
    /// Apply `batch` with the given record TTL.
    async fn apply_batch(&self, batch: &[PendingChange], ttl: u32) -> Result<(), ZoneWriteError>;

    /// Longest leftmost label the zone can represent.
    fn max_label_length(&self) -> usize {
        MAX_DNS_LABEL_LENGTH
    }
}

/// Result of a fully applied change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of changes written
    pub changes: usize,
    /// Number of update batches sent
    pub batches: usize,
}

/// Applies triage results through a [`ZoneWriter`].
#[derive(Debug, Clone)]
pub struct ZoneSynchronizer {
    settings: SyncSettings,
}

impl ZoneSynchronizer {
    /// Create a synchronizer with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidBatchSize`] when the batch size is zero.
    pub fn new(settings: SyncSettings) -> Result<Self, SyncError> {
        if settings.batch_size == 0 {
            return Err(SyncError::InvalidBatchSize(settings.batch_size));
        }
        Ok(Self { settings })
    }

    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Convert actionable summaries into zone changes.
    ///
    /// Summaries whose record name has a leftmost label longer than
    /// `max_label_length` are logged and left out.
    #[must_use]
    pub fn pending_changes(summaries: &TriageMap, max_label_length: usize) -> Vec<PendingChange> {
        let mut changes = Vec::new();

        for summary in summaries.values() {
            debug!(
                hostname = %summary.hostname,
                zone_ip = %summary.zone_ip,
                live_ip = %summary.live_ip,
                decision = %summary.decision,
                "Triage decision"
            );
            metrics::record_decision(summary.decision);

            let Some(action) = summary.decision.change_action() else {
                continue;
            };

            let name = zone_record_name(&summary.hostname);
            if leftmost_label_len(name) > max_label_length {
                warn!(
                    hostname = %summary.hostname,
                    limit = max_label_length,
                    "Leftmost label too long for the zone, skipping"
                );
                metrics::record_label_skipped();
                continue;
            }

            match summary.decision {
                Decision::Add => info!(name = %name, ip = %summary.live_ip, "Not published yet, adding"),
                Decision::Update => info!(
                    name = %name,
                    from = %summary.zone_ip,
                    to = %summary.live_ip,
                    "Published address differs, updating"
                ),
                Decision::Delete => info!(
                    name = %name,
                    ip = %summary.zone_ip,
                    "No live VM or unusable address, deleting"
                ),
                Decision::NoChange => {}
            }

            changes.push(PendingChange {
                name: name.to_string(),
                action,
                ip: summary.target_ip().to_string(),
            });
        }

        changes
    }

    /// Apply the actionable part of `summaries` through `writer`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoPendingChanges`] when nothing needs to be written
    /// - [`SyncError::DryRun`] when dry run withholds a non-empty change set
    /// - [`SyncError::PartialApplyFailure`] when at least one batch failed
    pub async fn sync<W>(&self, summaries: &TriageMap, writer: &W) -> Result<SyncReport, SyncError>
    where
        W: ZoneWriter + ?Sized,
    {
        info!(hostnames = summaries.len(), "Starting zone sync");

        let changes = Self::pending_changes(summaries, writer.max_label_length());

        if changes.is_empty() {
            info!("No action after processing, all records are in sync");
            return Err(SyncError::NoPendingChanges);
        }

        for change in &changes {
            metrics::record_pending_change(change.action);
        }

        if self.settings.dry_run {
            info!(pending = changes.len(), "Dry run enabled, no updates made to the zone");
            return Err(SyncError::DryRun {
                pending: changes.len(),
            });
        }

        let ranges = plan_batches(changes.len(), self.settings.batch_size)?;
        let total = ranges.len();
        let mut failed = 0;

        info!(changes = changes.len(), batches = total, "Applying zone changes");

        for (index, range) in ranges.into_iter().enumerate() {
            let batch = &changes[range.clone()];
            debug!(
                batch = index + 1,
                start = range.start,
                end = range.end - 1,
                "Sending update batch"
            );

            match writer.apply_batch(batch, self.settings.record_ttl).await {
                Ok(()) => {
                    info!(batch = index + 1, size = batch.len(), "Update batch applied");
                    metrics::record_batch(true);
                }
                Err(e) => {
                    error!(
                        batch = index + 1,
                        size = batch.len(),
                        error = %e,
                        "Update batch failed, continuing with remaining batches"
                    );
                    metrics::record_batch(false);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(SyncError::PartialApplyFailure { failed, total });
        }

        Ok(SyncReport {
            changes: changes.len(),
            batches: total,
        })
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod sync_tests;
