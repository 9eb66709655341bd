// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process configuration.
//!
//! Every option can be given on the command line or through the environment.
//! Sync knobs are parsed leniently: an unusable value falls back to the
//! default instead of stopping the process.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::warn;
use url::Url;

use crate::constants::{
    DEFAULT_DNS_RECORD_TTL_SECS, DEFAULT_REGISTRY_LABEL_SELECTOR, DEFAULT_SYNC_FREQUENCY_SECS,
    DEFAULT_TSIG_ALGORITHM, DEFAULT_UPDATE_BATCH_SIZE, DRY_RUN_DISABLED_VALUE,
    METRICS_SERVER_PORT,
};
use crate::sync::SyncSettings;
use crate::tsig::{parse_algorithm, TsigKey};

/// Keeps the published zone in line with the hypervisor inventory.
#[derive(Debug, Clone, Parser)]
#[command(name = "vm-dns-sync", version, about)]
pub struct Config {
    /// Seconds between two sync cycles
    #[arg(
        long,
        env = "DNS_SYNC_FREQUENCY",
        default_value_t = DEFAULT_SYNC_FREQUENCY_SECS,
        value_parser = parse_sync_frequency
    )]
    pub sync_frequency: u64,

    /// Maximum number of changes per zone update
    #[arg(
        long,
        env = "DNS_UPDATE_BATCH_SIZE",
        default_value_t = DEFAULT_UPDATE_BATCH_SIZE,
        value_parser = parse_batch_size
    )]
    pub batch_size: usize,

    /// Dry run stays on unless this is exactly `FALSE`
    #[arg(
        long,
        env = "DNS_UPDATE_DRY_RUN",
        default_value = "TRUE",
        value_parser = parse_dry_run,
        action = ArgAction::Set
    )]
    pub dry_run: bool,

    /// Zone apex, e.g. `vms.example.com`
    #[arg(long, env = "DNS_ZONE")]
    pub zone: String,

    /// Primary server accepting transfers and updates (`host[:port]`)
    #[arg(long, env = "DNS_SERVER")]
    pub dns_server: String,

    /// TTL of every written record
    #[arg(long, env = "DNS_RECORD_TTL", default_value_t = DEFAULT_DNS_RECORD_TTL_SECS)]
    pub record_ttl: u32,

    #[arg(long, env = "DNS_TSIG_KEY_NAME")]
    pub tsig_key_name: Option<String>,

    #[arg(long, env = "DNS_TSIG_ALGORITHM", default_value = DEFAULT_TSIG_ALGORITHM)]
    pub tsig_algorithm: String,

    #[arg(long, env = "DNS_TSIG_SECRET", hide_env_values = true)]
    pub tsig_secret: Option<String>,

    /// BIND `key { }` file; takes precedence over the individual TSIG options
    #[arg(long, env = "DNS_TSIG_KEY_FILE")]
    pub tsig_key_file: Option<PathBuf>,

    /// vSphere endpoint; user-info in the URL is used as credentials
    #[arg(long, env = "VMWARE_SDDC_URL", hide_env_values = true)]
    pub vmware_sddc_url: Url,

    #[arg(long, env = "VMWARE_USERNAME")]
    pub vmware_username: Option<String>,

    #[arg(long, env = "VMWARE_PASSWORD", hide_env_values = true)]
    pub vmware_password: Option<String>,

    /// `false` disables certificate verification
    #[arg(
        long,
        env = "VMWARE_VERIFY_SSL",
        default_value = "true",
        value_parser = parse_verify_ssl,
        action = ArgAction::Set
    )]
    pub vmware_verify_ssl: bool,

    /// Kubeconfig of the registry cluster; in-cluster or default config otherwise
    #[arg(long, env = "CLUSTER_KUBECONFIG")]
    pub cluster_kubeconfig: Option<PathBuf>,

    #[arg(long, env = "REGISTRY_LABEL_SELECTOR", default_value = DEFAULT_REGISTRY_LABEL_SELECTOR)]
    pub registry_label_selector: String,

    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    #[arg(long)]
    pub disable_metrics: bool,
}

impl Config {
    /// Settings handed to the synchronizer at construction.
    #[must_use]
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            batch_size: self.batch_size,
            dry_run: self.dry_run,
            record_ttl: self.record_ttl,
        }
    }

    #[must_use]
    pub fn sync_period(&self) -> Duration {
        Duration::from_secs(self.sync_frequency)
    }

    /// Resolve the TSIG key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file cannot be read, only one of key name
    /// and secret is set, or the algorithm is unsupported.
    pub fn tsig_key(&self) -> Result<Option<TsigKey>> {
        if let Some(path) = &self.tsig_key_file {
            return TsigKey::from_file(path).map(Some);
        }

        match (&self.tsig_key_name, &self.tsig_secret) {
            (None, None) => Ok(None),
            (Some(name), Some(secret)) => {
                parse_algorithm(&self.tsig_algorithm)
                    .context("Invalid DNS_TSIG_ALGORITHM")?;
                Ok(Some(TsigKey {
                    name: name.clone(),
                    algorithm: self.tsig_algorithm.clone(),
                    secret: secret.clone(),
                }))
            }
            _ => anyhow::bail!("DNS_TSIG_KEY_NAME and DNS_TSIG_SECRET must be set together"),
        }
    }
}

/// Parse the sync frequency, falling back to the default on bad input.
#[allow(clippy::unnecessary_wraps)]
fn parse_sync_frequency(value: &str) -> Result<u64, String> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => {
            warn!(
                value,
                default = DEFAULT_SYNC_FREQUENCY_SECS,
                "Invalid sync frequency, using default"
            );
            Ok(DEFAULT_SYNC_FREQUENCY_SECS)
        }
    }
}

/// Parse the batch size, falling back to the default on bad input or zero.
#[allow(clippy::unnecessary_wraps)]
fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => {
            warn!(
                value,
                default = DEFAULT_UPDATE_BATCH_SIZE,
                "Invalid update batch size, using default"
            );
            Ok(DEFAULT_UPDATE_BATCH_SIZE)
        }
    }
}

/// Dry run is disabled only by the exact value `FALSE`.
#[allow(clippy::unnecessary_wraps)]
fn parse_dry_run(value: &str) -> Result<bool, String> {
    Ok(value != DRY_RUN_DISABLED_VALUE)
}

#[allow(clippy::unnecessary_wraps)]
fn parse_verify_ssl(value: &str) -> Result<bool, String> {
    Ok(!value.trim().eq_ignore_ascii_case("false"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
