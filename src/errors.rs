// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the synchronization cycle.
//!
//! This module provides specialized error types for:
//! - Cycle outcomes that are not a clean apply (nothing to do, dry run, partial failure)
//! - Collaborator failures (hypervisor, registry or zone unreachable)
//! - Failures of a single zone update batch
//!
//! None of these are fatal to the process. The outer loop logs them by kind
//! and retries the whole cycle after one period.

use thiserror::Error;

/// Outcome of a cycle that did not end in a clean apply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Triage produced no actionable change after label filtering.
    ///
    /// The zone already matches the live inventory.
    #[error("DNS000: No action to take, zone is in sync")]
    NoPendingChanges,

    /// One or more update batches were rejected or could not be delivered.
    ///
    /// All batches were still attempted. Failed batches are retried with the
    /// next full cycle, never individually.
    #[error("DNS001: {failed} of {total} update batches failed")]
    PartialApplyFailure {
        /// Number of batches that failed
        failed: usize,
        /// Number of batches attempted
        total: usize,
    },

    /// A correctly computed change set was withheld because dry run is enabled.
    #[error("DNS002: Dry run, {pending} changes withheld")]
    DryRun {
        /// Number of changes that would have been written
        pending: usize,
    },

    /// A collaborator could not be reached; the cycle aborted before triage.
    #[error("DNS003: {collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        /// Which collaborator failed (`hypervisor`, `registry`, `zone`)
        collaborator: &'static str,
        /// Underlying failure
        reason: String,
    },

    /// Batch size of zero cannot partition a change set.
    #[error("DNS004: Invalid batch size {0}, must be at least 1")]
    InvalidBatchSize(usize),
}

impl SyncError {
    /// Build a [`SyncError::CollaboratorUnavailable`] from any error chain.
    pub fn unavailable(collaborator: &'static str, err: &anyhow::Error) -> Self {
        Self::CollaboratorUnavailable {
            collaborator,
            reason: format!("{err:#}"),
        }
    }

    /// Stable short code, the prefix of the display message.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoPendingChanges => "DNS000",
            Self::PartialApplyFailure { .. } => "DNS001",
            Self::DryRun { .. } => "DNS002",
            Self::CollaboratorUnavailable { .. } => "DNS003",
            Self::InvalidBatchSize(_) => "DNS004",
        }
    }

    /// CamelCase reason used in logs and metric labels.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoPendingChanges => "NoPendingChanges",
            Self::PartialApplyFailure { .. } => "PartialApplyFailure",
            Self::DryRun { .. } => "DryRun",
            Self::CollaboratorUnavailable { .. } => "CollaboratorUnavailable",
            Self::InvalidBatchSize(_) => "InvalidBatchSize",
        }
    }

    /// Returns true if waiting one period and rerunning the cycle can succeed.
    ///
    /// Only a configuration error is not recoverable by retrying.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidBatchSize(_))
    }
}

/// Failure of a single zone update batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneWriteError {
    /// The server answered the UPDATE with a non-`NoError` response code
    #[error("Update of zone '{zone}' rejected by {server}: {code}")]
    UpdateRejected {
        /// Zone the update targeted
        zone: String,
        /// DNS server that rejected the update
        server: String,
        /// Response code returned
        code: String,
    },

    /// The update could not be delivered (connection, timeout, signing)
    #[error("Failed to send update for zone '{zone}' to {server}: {reason}")]
    Transport {
        /// Zone the update targeted
        zone: String,
        /// DNS server that could not be reached
        server: String,
        /// Underlying failure
        reason: String,
    },

    /// A change in the batch cannot be encoded as a DNS record
    #[error("Invalid record data for '{name}': {reason}")]
    InvalidRecord {
        /// Record name
        name: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
