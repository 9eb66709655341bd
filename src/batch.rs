// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Batch planning for zone updates.
//!
//! Sending one DNS UPDATE per record is wasteful, and a single UPDATE for the
//! whole change set can exceed what the server accepts. Changes are therefore
//! grouped into contiguous, bounded ranges.

use std::ops::Range;

use crate::errors::SyncError;

/// Split `[0, total)` into ascending half-open ranges of at most `batch_size`.
///
/// Every range except possibly the last has length exactly `batch_size`.
/// `total == 0` yields no ranges.
///
/// # Errors
///
/// Returns [`SyncError::InvalidBatchSize`] when `batch_size` is zero.
///
/// # Example
///
/// ```rust
/// use vm_dns_sync::batch::plan_batches;
///
/// let ranges = plan_batches(100, 13).unwrap();
/// assert_eq!(ranges.len(), 8);
/// assert_eq!(ranges[7], 91..100);
/// ```
pub fn plan_batches(total: usize, batch_size: usize) -> Result<Vec<Range<usize>>, SyncError> {
    if batch_size == 0 {
        return Err(SyncError::InvalidBatchSize(batch_size));
    }

    Ok((0..total)
        .step_by(batch_size)
        .map(|start| start..total.min(start + batch_size))
        .collect())
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod batch_tests;
