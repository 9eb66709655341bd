// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use vm_dns_sync::{
    config::Config,
    constants::{METRICS_SERVER_BIND_ADDRESS, TOKIO_WORKER_THREADS},
    cycle::run_cycle,
    errors::SyncError,
    metrics,
    registry::{kube_client, KubeRegistry},
    sync::ZoneSynchronizer,
    vsphere::VsphereClient,
    zone::{resolve_server, Rfc2136Zone},
};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("vm-dns-sync")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn init_tracing() {
    // RUST_LOG selects the level (default info), RUST_LOG_FORMAT=json switches to JSON lines.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    // Before parsing, so fallback warnings from lenient options are emitted.
    init_tracing();
    let config = Config::parse();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    info!(
        zone = %config.zone,
        dns_server = %config.dns_server,
        frequency_secs = config.sync_frequency,
        batch_size = config.batch_size,
        dry_run = config.dry_run,
        "Starting VM DNS sync"
    );

    let synchronizer = ZoneSynchronizer::new(config.sync_settings())?;

    let server = resolve_server(&config.dns_server).await?;
    let zone = Rfc2136Zone::new(&config.zone, server, config.tsig_key()?)?;
    if config.dns_server != server.to_string() {
        debug!(dns_server = %config.dns_server, resolved = %server, "Resolved DNS server");
    }

    let inventory = VsphereClient::new(
        &config.vmware_sddc_url,
        config.vmware_username.as_deref(),
        config.vmware_password.as_deref(),
        config.vmware_verify_ssl,
    )?;

    let client = kube_client(config.cluster_kubeconfig.as_deref()).await?;
    let registry = KubeRegistry::new(client, config.registry_label_selector.clone());

    if !config.disable_metrics {
        let addr: SocketAddr = format!("{METRICS_SERVER_BIND_ADDRESS}:{}", config.metrics_port)
            .parse()
            .context("Invalid metrics bind address")?;
        tokio::spawn(async move {
            if let Err(e) = metrics::serve_metrics(addr).await {
                error!(error = %e, "Metrics server exited");
            }
        });
    }

    let period = config.sync_period();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        match run_cycle(&inventory, &registry, &zone, &zone, &synchronizer).await {
            Ok(report) => info!(
                changes = report.changes,
                batches = report.batches,
                "Zone updated"
            ),
            Err(e) => log_cycle_error(&e),
        }

        info!(next_in_secs = period.as_secs(), "Sync cycle finished");

        tokio::select! {
            () = tokio::time::sleep(period) => {}
            result = &mut shutdown => {
                result?;
                info!("Shutdown signal received, exiting");
                return Ok(());
            }
        }
    }
}

fn log_cycle_error(err: &SyncError) {
    match err {
        SyncError::NoPendingChanges | SyncError::DryRun { .. } => {
            info!(code = err.code(), reason = err.reason(), "{err}");
        }
        SyncError::PartialApplyFailure { .. } | SyncError::CollaboratorUnavailable { .. } => {
            warn!(code = err.code(), reason = err.reason(), "{err}");
        }
        SyncError::InvalidBatchSize(_) => {
            error!(code = err.code(), reason = err.reason(), "{err}");
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for SIGINT"),
            _ = sigterm.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for SIGINT")
    }
}
