// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Data shared by triage, batch planning and synchronization.
//!
//! Everything here is cycle-scoped value data: it is built from a fresh fetch
//! of the three collaborators and discarded once the cycle ends.

use std::collections::BTreeMap;
use std::fmt;

use crate::constants::HOSTNAME_SCHEME_PREFIX;

/// Hypervisor inventory: VM name → IP literal.
pub type LiveMap = BTreeMap<String, String>;

/// Registry bindings: hostname → VM name.
pub type RegistryMap = BTreeMap<String, String>;

/// Published zone: hostname → IP literal.
pub type ZoneMap = BTreeMap<String, String>;

/// Triage output keyed by hostname.
pub type TriageMap = BTreeMap<String, TriageSummary>;

/// Which source(s) a hostname was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Published in the zone, no live VM resolves to it
    ZoneOnly,
    /// Resolves to a live VM, not yet published
    LiveOnly,
    /// Published and resolvable
    Both,
}

/// Action decided for a hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    NoChange,
    Add,
    Update,
    Delete,
}

impl Decision {
    /// Lowercase name used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoChange => "no_change",
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Write action for this decision, `None` when nothing is written.
    #[must_use]
    pub fn change_action(self) -> Option<ChangeAction> {
        match self {
            Self::NoChange => None,
            Self::Add | Self::Update => Some(ChangeAction::Upsert),
            Self::Delete => Some(ChangeAction::Delete),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-hostname triage result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageSummary {
    /// Hostname as keyed in the zone map (carries the `http://` prefix)
    pub hostname: String,
    /// Currently published IP, empty when the hostname is not in the zone
    pub zone_ip: String,
    /// IP resolved through registry and hypervisor, empty when no live VM
    pub live_ip: String,
    pub provenance: Provenance,
    pub decision: Decision,
}

impl TriageSummary {
    /// IP that a write for this summary must carry.
    ///
    /// Deletes target the stale zone record, everything else the live address.
    #[must_use]
    pub fn target_ip(&self) -> &str {
        match self.decision {
            Decision::Delete => &self.zone_ip,
            _ => &self.live_ip,
        }
    }
}

/// Write action understood by the zone writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    /// Create or replace the A record
    Upsert,
    /// Remove the A record holding the given IP
    Delete,
}

impl ChangeAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "UPSERT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single zone change derived from an actionable summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    /// Zone-formatted record name (no scheme prefix, no trailing dot)
    pub name: String,
    pub action: ChangeAction,
    pub ip: String,
}

/// Strip the scheme prefix and the trailing root dot from a hostname.
///
/// ```rust
/// use vm_dns_sync::model::zone_record_name;
///
/// assert_eq!(zone_record_name("http://www.example.com."), "www.example.com");
/// assert_eq!(zone_record_name("www.example.com"), "www.example.com");
/// ```
#[must_use]
pub fn zone_record_name(hostname: &str) -> &str {
    let name = hostname
        .strip_prefix(HOSTNAME_SCHEME_PREFIX)
        .unwrap_or(hostname);
    name.strip_suffix('.').unwrap_or(name)
}

/// Length of the leftmost DNS label of a zone-formatted record name.
#[must_use]
pub fn leftmost_label_len(record_name: &str) -> usize {
    record_name.split('.').next().map_or(0, str::len)
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod model_tests;
