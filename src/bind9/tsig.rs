// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TSIG key handling for authenticated dynamic updates.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::Name;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::fmt;
use std::str::FromStr;

use crate::constants::{TSIG_FUDGE_TIME_SECS, TSIG_KEY_NAME};

/// Pre-shared HMAC-SHA256 key used to sign updates to the internal primary.
///
/// The secret is decoded once at startup so a malformed key is a
/// configuration error instead of a failure on the first admission request.
#[derive(Clone, PartialEq, Eq)]
pub struct TsigKey {
    name: String,
    secret: Vec<u8>,
}

impl TsigKey {
    /// Decode a base64 secret for the key named `internal.`.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty or not valid base64.
    pub fn from_base64(secret: &str) -> Result<Self> {
        Self::with_name(TSIG_KEY_NAME, secret)
    }

    /// Decode a base64 secret for an arbitrary key name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid DNS name, or the secret is
    /// empty or not valid base64.
    pub fn with_name(name: &str, secret: &str) -> Result<Self> {
        Name::from_str(name).with_context(|| format!("Invalid TSIG key name: {name}"))?;

        let secret = BASE64
            .decode(secret.trim())
            .context("Failed to decode TSIG key")?;
        if secret.is_empty() {
            anyhow::bail!("TSIG key secret is empty");
        }

        Ok(Self {
            name: name.to_string(),
            secret,
        })
    }

    /// Key name as sent in the TSIG record.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a TSIG signer for one client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if hickory rejects the key material.
    pub fn signer(&self) -> Result<TSigner> {
        let signer = TSigner::new(
            self.secret.clone(),
            TsigAlgorithm::HmacSha256,
            Name::from_str(&self.name).context("Invalid TSIG key name")?,
            TSIG_FUDGE_TIME_SECS,
        )
        .context("Failed to create TSIG signer")?;

        Ok(signer)
    }
}

impl fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &"hmac-sha256")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[path = "tsig_tests.rs"]
mod tsig_tests;
