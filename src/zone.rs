// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS zone access over the wire.
//!
//! - Listing uses a zone transfer (AXFR) over TCP and keeps only `A` records.
//! - Writing sends one RFC 2136 UPDATE message per batch. The server applies
//!   an UPDATE atomically, so a batch either lands entirely or not at all.
//!
//! hickory-client is synchronous; every network call runs on the blocking pool.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_client::proto::xfer::{DnsRequest, DnsRequestOptions};
use hickory_client::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_client::tcp::TcpClientConnection;
use tracing::{debug, error, info};

use crate::constants::{DNS_PORT, HOSTNAME_SCHEME_PREFIX};
use crate::cycle::ZoneSource;
use crate::errors::ZoneWriteError;
use crate::model::{ChangeAction, PendingChange, ZoneMap};
use crate::sync::ZoneWriter;
use crate::tsig::{create_tsig_signer, TsigKey};

/// Resolve `host[:port]` to a socket address, defaulting to port 53.
///
/// # Errors
///
/// Returns an error if the name does not resolve.
pub async fn resolve_server(server: &str) -> Result<SocketAddr> {
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = server.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DNS_PORT));
    }

    let target = if server.contains(':') {
        server.to_string()
    } else {
        format!("{server}:{DNS_PORT}")
    };

    let addr = tokio::net::lookup_host(&target)
        .await
        .with_context(|| format!("Failed to resolve DNS server {target}"))?
        .next()
        .with_context(|| format!("DNS server {target} resolved to no address"))?;

    Ok(addr)
}

/// Build the zone map from transferred records.
///
/// Only `A` records are kept. Records owned by a nameserver target (glue) or
/// by a zone apex (SOA owner) are left out so they are never scheduled for
/// deletion. Keys carry the `http://` prefix and no trailing dot.
pub fn zone_map_from_records<'a, I>(records: I) -> ZoneMap
where
    I: IntoIterator<Item = &'a Record>,
{
    let records: Vec<&Record> = records.into_iter().collect();

    let reserved: HashSet<Name> = records
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::NS(ns)) => Some(ns.0.to_lowercase()),
            Some(RData::SOA(_)) => Some(record.name().to_lowercase()),
            _ => None,
        })
        .collect();

    records
        .into_iter()
        .filter(|record| record.record_type() == RecordType::A)
        .filter(|record| {
            let infrastructure = reserved.contains(&record.name().to_lowercase());
            if infrastructure {
                debug!(name = %record.name(), "Nameserver or apex address, not managed");
            }
            !infrastructure
        })
        .filter_map(|record| match record.data() {
            Some(RData::A(ip)) => {
                let name = record.name().to_string();
                let hostname = format!(
                    "{HOSTNAME_SCHEME_PREFIX}{}",
                    name.strip_suffix('.').unwrap_or(&name)
                );
                Some((hostname, ip.to_string()))
            }
            _ => None,
        })
        .collect()
}

/// Build one RFC 2136 UPDATE message for a batch.
///
/// Upserts replace the whole A RRset of the name; deletes remove only the
/// record carrying the given IP.
///
/// # Errors
///
/// Returns [`ZoneWriteError::InvalidRecord`] if a name or IPv4 address cannot be encoded.
pub fn build_update_message(
    zone: &Name,
    batch: &[PendingChange],
    ttl: u32,
) -> Result<Message, ZoneWriteError> {
    let mut message = Message::new();
    message
        .set_id(rand::random::<u16>())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);

    let mut zone_query = Query::new();
    zone_query
        .set_name(zone.clone())
        .set_query_class(DNSClass::IN)
        .set_query_type(RecordType::SOA);
    message.add_query(zone_query);

    for change in batch {
        let invalid = |reason: String| ZoneWriteError::InvalidRecord {
            name: change.name.clone(),
            reason,
        };

        let fqdn = Name::from_str(&format!("{}.", change.name))
            .map_err(|e| invalid(format!("invalid DNS name: {e}")))?;
        let ip = Ipv4Addr::from_str(&change.ip)
            .map_err(|e| invalid(format!("invalid IPv4 address '{}': {e}", change.ip)))?;

        match change.action {
            ChangeAction::Upsert => {
                let mut rrset = Record::with(fqdn.clone(), RecordType::A, 0);
                rrset.set_dns_class(DNSClass::ANY);
                message.add_name_server(rrset);

                let mut record = Record::from_rdata(fqdn, ttl, RData::A(ip.into()));
                record.set_dns_class(DNSClass::IN);
                message.add_name_server(record);
            }
            ChangeAction::Delete => {
                let mut record = Record::from_rdata(fqdn, 0, RData::A(ip.into()));
                record.set_dns_class(DNSClass::NONE);
                message.add_name_server(record);
            }
        }
    }

    Ok(message)
}

/// A zone served by an RFC 2136 capable primary.
#[derive(Debug, Clone)]
pub struct Rfc2136Zone {
    zone: Name,
    server: SocketAddr,
    tsig: Option<TsigKey>,
}

impl Rfc2136Zone {
    /// # Errors
    ///
    /// Returns an error if the zone name is invalid or the TSIG key is unusable.
    pub fn new(zone: &str, server: SocketAddr, tsig: Option<TsigKey>) -> Result<Self> {
        let absolute = if zone.ends_with('.') {
            zone.to_string()
        } else {
            format!("{zone}.")
        };
        let zone = Name::from_str(&absolute).with_context(|| format!("Invalid zone name: {zone}"))?;

        if let Some(key) = &tsig {
            create_tsig_signer(key)?;
        }

        Ok(Self { zone, server, tsig })
    }

    #[must_use]
    pub fn zone(&self) -> &Name {
        &self.zone
    }

    #[must_use]
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    fn connect(server: SocketAddr, tsig: Option<&TsigKey>) -> Result<SyncClient<TcpClientConnection>> {
        let conn = TcpClientConnection::new(server)
            .with_context(|| format!("Failed to create TCP connection to {server}"))?;

        match tsig {
            Some(key) => Ok(SyncClient::with_tsigner(conn, create_tsig_signer(key)?)),
            None => Ok(SyncClient::new(conn)),
        }
    }
}

#[async_trait]
impl ZoneSource for Rfc2136Zone {
    async fn fetch_zone_records(&self) -> Result<ZoneMap> {
        let zone = self.zone.clone();
        let server = self.server;
        let tsig = self.tsig.clone();

        info!(zone = %zone, server = %server, "Transferring zone");

        let records = tokio::task::spawn_blocking(move || -> Result<Vec<Record>> {
            let client = Self::connect(server, tsig.as_ref())?;
            let mut records = Vec::new();

            let stream = client
                .zone_transfer(&zone, None)
                .with_context(|| format!("Failed to start zone transfer of {zone}"))?;
            for response in stream {
                let response =
                    response.with_context(|| format!("Zone transfer of {zone} failed"))?;
                if response.response_code() != ResponseCode::NoError {
                    anyhow::bail!(
                        "Zone transfer of {zone} refused: {:?}",
                        response.response_code()
                    );
                }
                records.extend(response.answers().iter().cloned());
            }

            Ok(records)
        })
        .await
        .context("Zone transfer task failed")??;

        let zone_map = zone_map_from_records(&records);
        debug!(
            transferred = records.len(),
            a_records = zone_map.len(),
            "Processed zone records"
        );

        Ok(zone_map)
    }
}

#[async_trait]
impl ZoneWriter for Rfc2136Zone {
    async fn apply_batch(&self, batch: &[PendingChange], ttl: u32) -> Result<(), ZoneWriteError> {
        let message = build_update_message(&self.zone, batch, ttl)?;

        for change in batch {
            debug!(action = %change.action, name = %change.name, ip = %change.ip, "Queued change");
        }

        let zone = self.zone.to_string();
        let server = self.server;
        let tsig = self.tsig.clone();
        let transport = {
            let zone = zone.clone();
            move |reason: String| ZoneWriteError::Transport {
                zone: zone.clone(),
                server: server.to_string(),
                reason,
            }
        };

        let blocking_transport = transport.clone();
        let response_code = tokio::task::spawn_blocking(move || {
            let client = Self::connect(server, tsig.as_ref())
                .map_err(|e| blocking_transport(format!("{e:#}")))?;

            client
                .send(DnsRequest::new(message, DnsRequestOptions::default()))
                .into_iter()
                .next()
                .ok_or_else(|| blocking_transport("no response to UPDATE".to_string()))?
                .map(|response| response.response_code())
                .map_err(|e| blocking_transport(e.to_string()))
        })
        .await
        .map_err(|e| transport(format!("update task failed: {e}")))??;

        match response_code {
            ResponseCode::NoError => Ok(()),
            code => {
                error!(zone = %zone, server = %server, code = ?code, "UPDATE rejected by server");
                Err(ZoneWriteError::UpdateRejected {
                    zone,
                    server: server.to_string(),
                    code: format!("{code:?}"),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
