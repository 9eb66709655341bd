// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # vm-dns-sync - VM inventory to DNS zone reconciler
//!
//! Keeps the `A` records of a DNS zone in line with the VMs running on a
//! vSphere hypervisor, using a Kubernetes-hosted registry that maps public
//! hostnames to VM names.
//!
//! ## Overview
//!
//! Every cycle starts cold:
//!
//! 1. Fetch the live inventory (VM name → IP), the published zone
//!    (hostname → IP) and the registry (hostname → VM name)
//! 2. [`triage`] every hostname into add, update, delete or no change
//! 3. Hand the result to the [`sync::ZoneSynchronizer`], which gates on dry
//!    run, splits changes into batches and applies them in order
//!
//! ## Modules
//!
//! - [`model`] - Maps, triage summaries and pending changes
//! - [`triage`] - The three-way comparison
//! - [`batch`] - Batch planning
//! - [`sync`] - Dry-run gating and batched apply
//! - [`cycle`] - Collaborator traits and one full cycle
//! - [`vsphere`], [`registry`], [`zone`] - Collaborator implementations
//!
//! ## Example
//!
//! ```rust
//! use vm_dns_sync::model::{Decision, LiveMap, RegistryMap, ZoneMap};
//! use vm_dns_sync::triage::triage;
//!
//! let live = LiveMap::from([("vm-1".to_string(), "10.0.0.1".to_string())]);
//! let registry = RegistryMap::from([(
//!     "http://web.example.com".to_string(),
//!     "vm-1".to_string(),
//! )]);
//! let zone = ZoneMap::new();
//!
//! let summaries = triage(&live, &zone, &registry);
//! assert_eq!(summaries["http://web.example.com"].decision, Decision::Add);
//! ```

pub mod batch;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod retry;
pub mod sync;
pub mod triage;
pub mod tsig;
pub mod vsphere;
pub mod zone;
