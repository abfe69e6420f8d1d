// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Transport for signed UPDATE messages.
//!
//! [`UpdateTransport`] is the seam between the internal updater and the
//! network. Production uses [`TsigTcpTransport`]; tests substitute a
//! recording fake.

use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::{Message, ResponseCode};
use hickory_client::tcp::TcpClientConnection;
use hickory_proto::xfer::{DnsRequest, DnsRequestOptions};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

use super::tsig::TsigKey;
use crate::retry::CallError;

/// Sends one UPDATE message and reports the server's response code.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// Send `message` to the primary.
    ///
    /// # Errors
    ///
    /// Returns a transient [`CallError`] if the server could not be reached
    /// or did not answer, and a permanent one if the message could not be
    /// signed.
    async fn send_update(&self, message: Message) -> Result<ResponseCode, CallError>;
}

/// TSIG-signed UPDATE over TCP to the internal BIND9 primary.
#[derive(Debug, Clone)]
pub struct TsigTcpTransport {
    server: SocketAddr,
    key: TsigKey,
    timeout: Duration,
}

impl TsigTcpTransport {
    #[must_use]
    pub fn new(server: SocketAddr, key: TsigKey, timeout: Duration) -> Self {
        Self {
            server,
            key,
            timeout,
        }
    }

    /// Address of the primary.
    #[must_use]
    pub fn server(&self) -> SocketAddr {
        self.server
    }
}

#[async_trait]
impl UpdateTransport for TsigTcpTransport {
    async fn send_update(&self, message: Message) -> Result<ResponseCode, CallError> {
        let server = self.server;
        let key = self.key.clone();
        let timeout = self.timeout;

        // hickory's SyncClient blocks, keep it off the async workers.
        // A timed-out attempt keeps running on its thread, so a retry may overlap
        // it; replace and delete are idempotent and land the same state.
        tokio::task::spawn_blocking(move || {
            let conn = TcpClientConnection::with_timeout(server, timeout).map_err(|e| {
                CallError::transient(format!("Failed to connect to {server}: {e}"))
            })?;
            let signer = key
                .signer()
                .map_err(|e| CallError::permanent(format!("{e:#}")))?;
            let client = SyncClient::with_tsigner(conn, signer);

            debug!(server = %server, id = message.id(), "Sending DNS UPDATE");

            let request = DnsRequest::new(message, DnsRequestOptions::default());
            let response = client
                .send(request)
                .into_iter()
                .next()
                .ok_or_else(|| CallError::transient(format!("No response from {server}")))?
                .map_err(|e| CallError::transient(format!("DNS UPDATE to {server} failed: {e}")))?;

            Ok(response.response_code())
        })
        .await
        .map_err(|e| CallError::transient(format!("DNS UPDATE task failed: {e}")))?
    }
}
