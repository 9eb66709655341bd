// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the VM DNS synchronizer.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Synchronization Constants
// ============================================================================

/// Default number of seconds between two reconciliation cycles (10 minutes)
pub const DEFAULT_SYNC_FREQUENCY_SECS: u64 = 600;

/// Default number of record changes sent in a single DNS UPDATE message
pub const DEFAULT_UPDATE_BATCH_SIZE: usize = 25;

/// The only value of the dry-run setting that enables writes
pub const DRY_RUN_DISABLED_VALUE: &str = "FALSE";

/// Prefix carried by registry hostnames and zone map keys
pub const HOSTNAME_SCHEME_PREFIX: &str = "http://";

/// Marker used to recognise IPv6 literals reported by the hypervisor
pub const IPV6_LITERAL_MARKER: &str = "::";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for updates and zone transfers
pub const DNS_PORT: u16 = 53;

/// Maximum length of a single DNS label (RFC 1035)
pub const MAX_DNS_LABEL_LENGTH: usize = 63;

/// Default TTL for published A records (1 minute)
pub const DEFAULT_DNS_RECORD_TTL_SECS: u32 = 60;

/// TSIG fudge time in seconds (allows for clock skew)
pub const TSIG_FUDGE_TIME_SECS: u64 = 300;

/// Default TSIG algorithm name
pub const DEFAULT_TSIG_ALGORITHM: &str = "hmac-sha256";

// ============================================================================
// Registry (Kubernetes) Constants
// ============================================================================

/// Label selector identifying VM status `ConfigMap`s
pub const DEFAULT_REGISTRY_LABEL_SELECTOR: &str = "kind=vm-status";

/// `ConfigMap` key holding the inventory name of the VM
pub const REGISTRY_KEY_VM_NAME: &str = "VM_NAME";

/// `ConfigMap` key holding the deployment status of the VM
pub const REGISTRY_KEY_STATUS: &str = "STATUS";

/// `ConfigMap` key holding the public hostname of the VM
pub const REGISTRY_KEY_URL: &str = "URL";

/// Status value marking a VM as published
pub const REGISTRY_STATUS_DEPLOYED: &str = "deployed";

/// Page size for paginated Kubernetes list calls
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// Hypervisor (vSphere) Constants
// ============================================================================

/// vSphere Automation API session endpoint
pub const VSPHERE_SESSION_PATH: &str = "/api/session";

/// vSphere Automation API VM listing endpoint
pub const VSPHERE_VM_PATH: &str = "/api/vcenter/vm";

/// Header carrying the vSphere session token
pub const VSPHERE_SESSION_HEADER: &str = "vmware-api-session-id";

/// Timeout for a single vSphere HTTP request
pub const VSPHERE_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 2;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
