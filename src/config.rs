// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line and environment configuration.
//!
//! Every setting can be given as a flag or through the environment variable
//! the deployment manifests already use. Settings are read once at startup
//! and validated into [`Settings`]; a provider is enabled only when all of its
//! required settings are present:
//!
//! | Provider | Enabled when | Also requires |
//! |----------|--------------|---------------|
//! | internal (BIND9) | `BIND_DNS_UPDATE_KEY`, `BIND_MASTER_IP`, `INTERNAL_PROXY_FIP` | `PG_CONN_STR` |
//! | external (Route53) | `ROUTE53_ACCESS_KEY_ID`, `ROUTE53_SECRET_ACCESS_KEY` | `EXTERNAL_FORWARDED_IP` |
//!
//! A partially configured provider is disabled with a warning. Malformed
//! values are startup errors.

use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::bind9::TsigKey;
use crate::constants::{
    DEFAULT_CERT_ENTRIES_PATH, DEFAULT_DNS_MAX_ATTEMPTS, DEFAULT_DNS_TIMEOUT_MS,
    DEFAULT_EXTERNAL_DOMAINS_PATH, DEFAULT_RESYNC_INTERVAL_SECS, DNS_PORT,
    METRICS_SERVER_BIND_ADDRESS, WEBHOOK_BIND_ADDRESS, WEBHOOK_TLS_CERT_PATH,
    WEBHOOK_TLS_KEY_PATH,
};
use crate::retry::RetryPolicy;
use crate::route53::Route53Settings;

/// Keeps Ingress hostnames in BIND9 and Route53 in line with the cluster.
#[derive(Parser, Debug, Clone)]
#[command(name = "ingressdns", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the admission webhooks (and resync periodically)
    Webhook(WebhookArgs),
    /// Run one full resync pass and exit
    Resync,
}

/// Admission webhook server settings.
#[derive(Args, Debug, Clone)]
pub struct WebhookArgs {
    /// Address the HTTPS webhook server listens on
    #[arg(long, env = "WEBHOOK_BIND_ADDRESS", default_value = WEBHOOK_BIND_ADDRESS)]
    pub bind_address: SocketAddr,

    /// PEM certificate served by the webhook
    #[arg(long, env = "WEBHOOK_TLS_CERT", default_value = WEBHOOK_TLS_CERT_PATH)]
    pub tls_cert: PathBuf,

    /// PEM private key of the webhook certificate
    #[arg(long, env = "WEBHOOK_TLS_KEY", default_value = WEBHOOK_TLS_KEY_PATH)]
    pub tls_key: PathBuf,

    /// Address the plain HTTP metrics server listens on
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,

    /// Seconds between full resync passes; 0 disables periodic resync
    #[arg(long, env = "RESYNC_INTERVAL_SECS", default_value_t = DEFAULT_RESYNC_INTERVAL_SECS)]
    pub resync_interval_secs: u64,
}

impl WebhookArgs {
    /// Resync period, `None` when disabled.
    #[must_use]
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }
}

/// DNS provider and policy settings, shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// Base64 HMAC-SHA256 secret of the `internal.` TSIG key
    #[arg(long, env = "BIND_DNS_UPDATE_KEY", hide_env_values = true, global = true)]
    pub bind_update_key: Option<String>,

    /// BIND9 primary, `ip` or `ip:port` (port defaults to 53)
    #[arg(long, env = "BIND_MASTER_IP", global = true)]
    pub bind_master: Option<String>,

    /// Address internal records point at (the internal ingress proxy)
    #[arg(long, env = "INTERNAL_PROXY_FIP", global = true)]
    pub internal_target_ip: Option<String>,

    /// PostgreSQL connection string of the authoritative domain store
    #[arg(long, env = "PG_CONN_STR", hide_env_values = true, global = true)]
    pub pg_conn_str: Option<String>,

    #[arg(long, env = "ROUTE53_ACCESS_KEY_ID", global = true)]
    pub route53_access_key_id: Option<String>,

    #[arg(long, env = "ROUTE53_SECRET_ACCESS_KEY", hide_env_values = true, global = true)]
    pub route53_secret_access_key: Option<String>,

    #[arg(long, env = "ROUTE53_REGION", default_value = "us-east-1", global = true)]
    pub route53_region: String,

    /// Override the Route53 API endpoint
    #[arg(long, env = "ROUTE53_ENDPOINT_URL", global = true)]
    pub route53_endpoint_url: Option<url::Url>,

    /// Address external records point at (the public ingress)
    #[arg(long, env = "EXTERNAL_FORWARDED_IP", global = true)]
    pub external_forwarded_ip: Option<String>,

    /// Certificate coverage policy (JSON)
    #[arg(long, env = "CLUSTER_CERT_ENTRIES_PATH", default_value = DEFAULT_CERT_ENTRIES_PATH, global = true)]
    pub cert_entries: PathBuf,

    /// External exposure policy (JSON)
    #[arg(long, env = "EXTERNAL_DOMAINS_PATH", default_value = DEFAULT_EXTERNAL_DOMAINS_PATH, global = true)]
    pub external_domains: PathBuf,

    /// Timeout of a single DNS provider call, in milliseconds
    #[arg(long, env = "DNS_TIMEOUT_MS", default_value_t = DEFAULT_DNS_TIMEOUT_MS, global = true)]
    pub dns_timeout_ms: u64,

    /// Attempts per DNS provider call, first try included
    #[arg(long, env = "DNS_MAX_ATTEMPTS", default_value_t = DEFAULT_DNS_MAX_ATTEMPTS, global = true)]
    pub dns_max_attempts: u32,
}

/// Invalid or inconsistent configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A provider is enabled but a setting it needs is missing
    #[error("{provider} provider is enabled but {setting} is not set")]
    Missing {
        provider: &'static str,
        setting: &'static str,
    },

    /// A setting could not be parsed
    #[error("Invalid {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },
}

/// Settings of the internal BIND9 provider.
#[derive(Debug, Clone)]
pub struct InternalSettings {
    pub key: TsigKey,
    pub master: SocketAddr,
    pub target: Ipv4Addr,
    pub pg_conn_str: String,
}

/// Settings of the external Route53 provider.
#[derive(Debug, Clone)]
pub struct ExternalSettings {
    pub route53: Route53Settings,
    pub forwarded_ip: Ipv4Addr,
}

/// Validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` when the internal provider is not configured
    pub internal: Option<InternalSettings>,
    /// `None` when the external provider is not configured
    pub external: Option<ExternalSettings>,
    pub cert_entries: PathBuf,
    pub external_domains: PathBuf,
    pub retry: RetryPolicy,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|value| value.trim()).filter(|value| !value.is_empty())
}

fn parse_ipv4(setting: &'static str, value: &str) -> Result<Ipv4Addr, ConfigError> {
    value.parse().map_err(|e| ConfigError::Invalid {
        setting,
        reason: format!("'{value}' is not an IPv4 address: {e}"),
    })
}

/// Parse `ip` or `ip:port`; the port defaults to 53.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if `value` is neither form.
pub fn parse_master(value: &str) -> Result<SocketAddr, ConfigError> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }

    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| ConfigError::Invalid {
            setting: "BIND_MASTER_IP",
            reason: format!("'{value}' is not an address or address:port"),
        })
}

impl ProviderArgs {
    /// Validate the arguments into [`Settings`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if an enabled provider lacks a setting or any
    /// value is malformed.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Ok(Settings {
            internal: self.internal_settings()?,
            external: self.external_settings()?,
            cert_entries: self.cert_entries.clone(),
            external_domains: self.external_domains.clone(),
            retry: RetryPolicy::new(
                Duration::from_millis(self.dns_timeout_ms),
                self.dns_max_attempts,
            ),
        })
    }

    fn internal_settings(&self) -> Result<Option<InternalSettings>, ConfigError> {
        let key = present(self.bind_update_key.as_ref());
        let master = present(self.bind_master.as_ref());
        let target = present(self.internal_target_ip.as_ref());

        let (Some(key), Some(master), Some(target)) = (key, master, target) else {
            if key.is_some() || master.is_some() || target.is_some() {
                warn!(
                    "Internal DNS provider is partially configured (BIND_DNS_UPDATE_KEY, \
                     BIND_MASTER_IP and INTERNAL_PROXY_FIP are all required), disabling it"
                );
            }
            return Ok(None);
        };

        let pg_conn_str = present(self.pg_conn_str.as_ref()).ok_or(ConfigError::Missing {
            provider: "internal",
            setting: "PG_CONN_STR",
        })?;

        Ok(Some(InternalSettings {
            key: TsigKey::from_base64(key).map_err(|e| ConfigError::Invalid {
                setting: "BIND_DNS_UPDATE_KEY",
                reason: format!("{e:#}"),
            })?,
            master: parse_master(master)?,
            target: parse_ipv4("INTERNAL_PROXY_FIP", target)?,
            pg_conn_str: pg_conn_str.to_string(),
        }))
    }

    fn external_settings(&self) -> Result<Option<ExternalSettings>, ConfigError> {
        let access_key_id = present(self.route53_access_key_id.as_ref());
        let secret_access_key = present(self.route53_secret_access_key.as_ref());

        let (Some(access_key_id), Some(secret_access_key)) = (access_key_id, secret_access_key)
        else {
            if access_key_id.is_some() || secret_access_key.is_some() {
                warn!(
                    "External DNS provider is partially configured (ROUTE53_ACCESS_KEY_ID and \
                     ROUTE53_SECRET_ACCESS_KEY are both required), disabling it"
                );
            }
            return Ok(None);
        };

        let forwarded_ip =
            present(self.external_forwarded_ip.as_ref()).ok_or(ConfigError::Missing {
                provider: "external",
                setting: "EXTERNAL_FORWARDED_IP",
            })?;

        Ok(Some(ExternalSettings {
            route53: Route53Settings {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
                region: self.route53_region.clone(),
                endpoint_url: self
                    .route53_endpoint_url
                    .as_ref()
                    .map(|url| url.as_str().trim_end_matches('/').to_string()),
            },
            forwarded_ip: parse_ipv4("EXTERNAL_FORWARDED_IP", forwarded_ip)?,
        }))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
