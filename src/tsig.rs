// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TSIG key handling for signed zone transfers and updates.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::Name;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::path::Path;
use std::str::FromStr;

use crate::constants::TSIG_FUDGE_TIME_SECS;

/// TSIG key material.
#[derive(Clone, PartialEq, Eq)]
pub struct TsigKey {
    /// Key name as configured on the server
    pub name: String,
    /// HMAC algorithm name (e.g. `hmac-sha256`)
    pub algorithm: String,
    /// Base64-encoded secret
    pub secret: String,
}

impl std::fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TsigKey {
    /// Read a BIND key file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read TSIG key file {}", path.display()))?;
        parse_key_file(&content)
    }
}

/// Map an algorithm name to the hickory TSIG algorithm.
///
/// # Errors
///
/// Returns an error for unsupported algorithm names.
pub fn parse_algorithm(name: &str) -> Result<TsigAlgorithm> {
    match name.trim().trim_end_matches('.').to_ascii_lowercase().as_str() {
        "hmac-sha256" => Ok(TsigAlgorithm::HmacSha256),
        "hmac-sha384" => Ok(TsigAlgorithm::HmacSha384),
        "hmac-sha512" => Ok(TsigAlgorithm::HmacSha512),
        other => anyhow::bail!(
            "Unsupported TSIG algorithm '{other}'. Supported algorithms: hmac-sha256, hmac-sha384, hmac-sha512"
        ),
    }
}

/// Parse a BIND9 key file.
///
/// Expected format:
/// ```text
/// key "key-name" {
///     algorithm hmac-sha256;
///     secret "base64secret==";
/// };
/// ```
///
/// # Errors
///
/// Returns an error if the file format is invalid or required fields are missing.
pub fn parse_key_file(content: &str) -> Result<TsigKey> {
    let name = content
        .lines()
        .find(|line| line.trim_start().starts_with("key"))
        .and_then(|line| line.split('"').nth(1))
        .context("Failed to parse key name from key file")?
        .to_string();

    let algorithm = content
        .lines()
        .find(|line| line.contains("algorithm"))
        .and_then(|line| {
            line.split_whitespace()
                .nth(1)
                .map(|s| s.trim_end_matches(';'))
        })
        .context("Failed to parse algorithm from key file")?
        .to_string();

    let secret = content
        .lines()
        .find(|line| line.contains("secret"))
        .and_then(|line| line.split('"').nth(1))
        .context("Failed to parse secret from key file")?
        .to_string();

    parse_algorithm(&algorithm)?;

    Ok(TsigKey {
        name,
        algorithm,
        secret,
    })
}

/// Create a TSIG signer from key data.
///
/// # Errors
///
/// Returns an error if the algorithm is unsupported or key data is invalid.
pub fn create_tsig_signer(key: &TsigKey) -> Result<TSigner> {
    let algorithm = parse_algorithm(&key.algorithm)?;

    let key_bytes = BASE64
        .decode(&key.secret)
        .context("Failed to decode TSIG key")?;

    let signer = TSigner::new(
        key_bytes,
        algorithm,
        Name::from_str(&key.name).context("Invalid TSIG key name")?,
        u16::try_from(TSIG_FUDGE_TIME_SECS).unwrap_or(300),
    )
    .context("Failed to create TSIG signer")?;

    Ok(signer)
}

#[cfg(test)]
#[path = "tsig_tests.rs"]
mod tsig_tests;
