// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Live VM inventory from the vSphere Automation REST API.
//!
//! Each fetch opens a session, lists the VMs, asks the guest tools of every
//! powered-on VM for its address and closes the session again.

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{
    VSPHERE_REQUEST_TIMEOUT_SECS, VSPHERE_SESSION_HEADER, VSPHERE_SESSION_PATH, VSPHERE_VM_PATH,
};
use crate::cycle::InventorySource;
use crate::model::LiveMap;
use crate::retry::{http_backoff, send_with_retry, ExponentialBackoff};
use crate::triage::is_ipv6_literal;

const POWERED_ON: &str = "POWERED_ON";

/// Entry of `GET /api/vcenter/vm`.
#[derive(Debug, Clone, Deserialize)]
pub struct VmSummary {
    /// Managed object id, e.g. `vm-42`
    pub vm: String,
    pub name: String,
    #[serde(default)]
    pub power_state: Option<String>,
}

/// Body of `GET /api/vcenter/vm/{vm}/guest/identity`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestIdentity {
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Credentials for the session login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Split user-info out of the SDDC URL and apply explicit overrides.
///
/// Username and password are overridden independently; the returned URL
/// carries no credentials.
#[must_use]
pub fn resolve_credentials(
    sddc_url: &Url,
    username: Option<&str>,
    password: Option<&str>,
) -> (Url, Credentials) {
    let credentials = Credentials {
        username: username
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| sddc_url.username())
            .to_string(),
        password: password
            .filter(|p| !p.is_empty())
            .or_else(|| sddc_url.password())
            .unwrap_or_default()
            .to_string(),
    };

    let mut base = sddc_url.clone();
    // Only fails for URLs that cannot carry credentials at all.
    let _ = base.set_username("");
    let _ = base.set_password(None);

    (base, credentials)
}

/// Whether a guest address can enter triage.
///
/// IPv4 addresses are published. Addresses containing `::` are kept so
/// triage can apply its IPv6 rule; anything else (uncompressed IPv6,
/// garbage) would fail a whole update batch and is dropped here.
#[must_use]
pub fn is_publishable_guest_ip(ip: &str) -> bool {
    ip.parse::<Ipv4Addr>().is_ok() || is_ipv6_literal(ip)
}

/// vSphere inventory client.
pub struct VsphereClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
    backoff: fn() -> ExponentialBackoff,
}

impl VsphereClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        sddc_url: &Url,
        username: Option<&str>,
        password: Option<&str>,
        verify_ssl: bool,
    ) -> Result<Self> {
        let (base_url, credentials) = resolve_credentials(sddc_url, username, password);

        if !verify_ssl {
            warn!(url = %base_url, "Certificate verification disabled for vSphere");
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(VSPHERE_REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .context("Failed to build vSphere HTTP client")?;

        Ok(Self {
            http,
            base_url,
            credentials,
            backoff: http_backoff,
        })
    }

    /// Replace the retry policy used for session and listing calls.
    #[must_use]
    pub fn with_backoff(mut self, backoff: fn() -> ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid vSphere endpoint {path}"))
    }

    async fn login(&self) -> Result<String> {
        let url = self.endpoint(VSPHERE_SESSION_PATH)?;
        let response = send_with_retry(
            || {
                self.http
                    .post(url.clone())
                    .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            },
            (self.backoff)(),
            "vsphere_login",
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("vSphere login as {} rejected: HTTP {status}", self.credentials.username);
        }

        response
            .json::<String>()
            .await
            .context("Unexpected vSphere session response")
    }

    async fn logout(&self, session: &str) {
        let Ok(url) = self.endpoint(VSPHERE_SESSION_PATH) else {
            return;
        };
        match self
            .http
            .delete(url)
            .header(VSPHERE_SESSION_HEADER, session)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => debug!("vSphere session closed"),
            Ok(response) => debug!(status = %response.status(), "vSphere logout refused"),
            Err(e) => debug!(error = %e, "vSphere logout failed"),
        }
    }

    async fn list_vms(&self, session: &str) -> Result<Vec<VmSummary>> {
        let url = self.endpoint(VSPHERE_VM_PATH)?;
        let response = send_with_retry(
            || {
                self.http
                    .get(url.clone())
                    .header(VSPHERE_SESSION_HEADER, session)
            },
            (self.backoff)(),
            "vsphere_list_vms",
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Listing vSphere VMs failed: HTTP {status}");
        }

        response
            .json::<Vec<VmSummary>>()
            .await
            .context("Unexpected vSphere VM list response")
    }

    /// Guest IP reported by VM tools, `None` when the guest reports nothing.
    async fn guest_ip(&self, session: &str, vm: &str) -> Result<Option<String>> {
        let url = self.endpoint(&format!("{VSPHERE_VM_PATH}/{vm}/guest/identity"))?;
        let response = self
            .http
            .get(url)
            .header(VSPHERE_SESSION_HEADER, session)
            .send()
            .await
            .with_context(|| format!("Guest identity request for {vm} failed"))?;

        match response.status() {
            status if status.is_success() => {
                let identity = response
                    .json::<GuestIdentity>()
                    .await
                    .with_context(|| format!("Unexpected guest identity response for {vm}"))?;
                Ok(identity.ip_address.filter(|ip| !ip.is_empty()))
            }
            // Tools not running or guest not reachable.
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::NOT_FOUND => Ok(None),
            status => anyhow::bail!("Guest identity request for {vm} failed: HTTP {status}"),
        }
    }

    async fn collect_inventory(&self, session: &str) -> Result<LiveMap> {
        let vms = self.list_vms(session).await?;
        let mut live = LiveMap::new();

        for summary in &vms {
            debug!(vm = %summary.name, id = %summary.vm, "Fetched VM");

            if summary.power_state.as_deref() != Some(POWERED_ON) {
                info!(vm = %summary.name, "VM is not powered on, skipping");
                continue;
            }

            match self.guest_ip(session, &summary.vm).await? {
                Some(ip) if !is_publishable_guest_ip(&ip) => warn!(
                    vm = %summary.name,
                    ip = %ip,
                    "Guest address is neither IPv4 nor a compressed IPv6 literal, skipping"
                ),
                Some(ip) => {
                    debug!(vm = %summary.name, ip = %ip, "Adding VM");
                    live.insert(summary.name.clone(), ip);
                }
                None => info!(
                    vm = %summary.name,
                    "VM has no IP, either frozen or a template, skipping"
                ),
            }
        }

        info!(listed = vms.len(), with_ip = live.len(), "Fetched vSphere inventory");
        Ok(live)
    }
}

#[async_trait]
impl InventorySource for VsphereClient {
    async fn fetch_live_inventory(&self) -> Result<LiveMap> {
        let session = self.login().await?;
        let result = self.collect_inventory(&session).await;
        self.logout(&session).await;
        result
    }
}

#[cfg(test)]
#[path = "vsphere_tests.rs"]
mod vsphere_tests;
