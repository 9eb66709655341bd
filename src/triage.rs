// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Three-way triage between hypervisor, registry and zone.
//!
//! Triage never fails: missing data simply produces fewer summaries. The
//! result is keyed by hostname, so map iteration order cannot change it.
//!
//! # Policy
//!
//! | Zone | Live            | Decision   |
//! |------|-----------------|------------|
//! | yes  | no              | `Delete`   |
//! | no   | IPv4            | `Add`      |
//! | no   | IPv6            | `NoChange` |
//! | yes  | same IP         | `NoChange` |
//! | yes  | different, IPv4 | `Update`   |
//! | yes  | different, IPv6 | `Delete`   |
//!
//! IPv6 addresses reported by the hypervisor are never published.

use tracing::{debug, warn};

use crate::constants::IPV6_LITERAL_MARKER;
use crate::model::{
    Decision, LiveMap, Provenance, RegistryMap, TriageMap, TriageSummary, ZoneMap,
};

/// Whether the hypervisor reported an IPv6 literal instead of IPv4.
#[must_use]
pub fn is_ipv6_literal(ip: &str) -> bool {
    ip.contains(IPV6_LITERAL_MARKER)
}

/// Join registry bindings with the live inventory.
///
/// Hostnames whose VM name is not in the inventory are dropped.
#[must_use]
pub fn resolve_bindings(live: &LiveMap, registry: &RegistryMap) -> ZoneMap {
    registry
        .iter()
        .filter_map(|(hostname, vm_name)| match live.get(vm_name) {
            Some(ip) => Some((hostname.clone(), ip.clone())),
            None => {
                debug!(hostname = %hostname, vm = %vm_name, "Registry binding has no live VM");
                None
            }
        })
        .collect()
}

/// Classify every hostname seen in the zone or in the live join.
#[must_use]
pub fn triage(live: &LiveMap, zone: &ZoneMap, registry: &RegistryMap) -> TriageMap {
    let resolved = resolve_bindings(live, registry);

    // Pass 1: everything published is pessimistically scheduled for deletion
    let mut result: TriageMap = zone
        .iter()
        .map(|(hostname, zone_ip)| {
            (
                hostname.clone(),
                TriageSummary {
                    hostname: hostname.clone(),
                    zone_ip: zone_ip.clone(),
                    live_ip: String::new(),
                    provenance: Provenance::ZoneOnly,
                    decision: Decision::Delete,
                },
            )
        })
        .collect();

    // Pass 2: live hostnames refine or create entries
    for (hostname, live_ip) in resolved {
        let summary = match result.remove(&hostname) {
            Some(published) => {
                let decision = if live_ip == published.zone_ip {
                    Decision::NoChange
                } else if is_ipv6_literal(&live_ip) {
                    warn!(
                        hostname = %hostname,
                        ip = %live_ip,
                        "Hypervisor reported an IPv6 address, deleting the published record instead of updating"
                    );
                    Decision::Delete
                } else {
                    Decision::Update
                };

                TriageSummary {
                    live_ip,
                    provenance: Provenance::Both,
                    decision,
                    ..published
                }
            }
            None => {
                let decision = if is_ipv6_literal(&live_ip) {
                    warn!(
                        hostname = %hostname,
                        ip = %live_ip,
                        "Hypervisor reported an IPv6 address, not publishing"
                    );
                    Decision::NoChange
                } else {
                    Decision::Add
                };

                TriageSummary {
                    hostname: hostname.clone(),
                    zone_ip: String::new(),
                    live_ip,
                    provenance: Provenance::LiveOnly,
                    decision,
                }
            }
        };

        result.insert(hostname, summary);
    }

    result
}

#[cfg(test)]
#[path = "triage_tests.rs"]
mod triage_tests;
