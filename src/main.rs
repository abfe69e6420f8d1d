// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use ingressdns::{
    bind9::{InternalDnsUpdater, TsigTcpTransport},
    config::{Cli, Command, Settings, WebhookArgs},
    constants::TOKIO_WORKER_THREADS,
    domains::PgDomainSource,
    kubernetes::KubeIngressSource,
    policy::ZoneAuthorityResolver,
    reconcile::IngressDnsReconciler,
    route53::{ExternalDnsUpdater, Route53Provider},
    webhook::{metrics_router, webhook_router, WebhookState},
};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("ingressdns")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

fn init_tracing() {
    // Respects RUST_LOG if set, otherwise defaults to INFO level.
    // RUST_LOG_FORMAT=json switches to structured output.
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

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();

    // Every TLS client and the webhook server share the process-wide provider
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        anyhow::bail!("Failed to install rustls crypto provider: {e:?}");
    }

    info!("Starting ingress DNS controller");

    let settings = cli.provider.settings().context("Invalid configuration")?;
    let reconciler = build_reconciler(&settings).await?;

    match cli.command {
        Command::Resync => run_resync_once(reconciler.as_deref()).await,
        Command::Webhook(args) => run_webhook(args, reconciler).await,
    }
}

/// Wire both updaters; `None` when the internal provider is not configured.
async fn build_reconciler(settings: &Settings) -> Result<Option<Arc<IngressDnsReconciler>>> {
    let Some(internal) = &settings.internal else {
        warn!("Internal DNS provider is not configured, ingress DNS management is disabled");
        return Ok(None);
    };

    let resolver = Arc::new(
        ZoneAuthorityResolver::load(&settings.cert_entries, &settings.external_domains)
            .context("Failed to load certificate and exposure policies")?,
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let domains = PgDomainSource::connect_lazy(&internal.pg_conn_str)
        .context("Invalid authoritative domain store connection string")?;

    let transport = TsigTcpTransport::new(
        internal.master,
        internal.key.clone(),
        settings.retry.attempt_timeout,
    );
    info!(
        primary = %transport.server(),
        target = %internal.target,
        "Internal DNS provider enabled"
    );
    let internal_updater = InternalDnsUpdater::new(
        resolver.clone(),
        Arc::new(transport),
        internal.target,
        settings.retry.clone(),
    );

    let external_updater = match &settings.external {
        Some(external) => {
            info!(
                region = %external.route53.region,
                target = %external.forwarded_ip,
                "External DNS provider enabled"
            );
            ExternalDnsUpdater::new(
                resolver,
                Arc::new(Route53Provider::connect(&external.route53).await),
                external.forwarded_ip,
                settings.retry.clone(),
            )
        }
        None => {
            info!("External DNS provider is not configured");
            ExternalDnsUpdater::disabled(resolver)
        }
    };

    Ok(Some(Arc::new(IngressDnsReconciler::new(
        Arc::new(domains),
        Arc::new(KubeIngressSource::new(client)),
        internal_updater,
        external_updater,
    ))))
}

async fn run_resync_once(reconciler: Option<&IngressDnsReconciler>) -> Result<()> {
    let Some(reconciler) = reconciler else {
        info!("Nothing to resync without the internal DNS provider");
        return Ok(());
    };

    reconciler.resync().await.context("Resync failed")?;
    Ok(())
}

async fn run_webhook(
    args: WebhookArgs,
    reconciler: Option<Arc<IngressDnsReconciler>>,
) -> Result<()> {
    let tls = RustlsConfig::from_pem_file(&args.tls_cert, &args.tls_key)
        .await
        .with_context(|| {
            format!(
                "Failed to load webhook certificate {} and key {}",
                args.tls_cert.display(),
                args.tls_key.display()
            )
        })?;

    let state = Arc::new(WebhookState::new(reconciler.clone()));
    let webhook = axum_server::bind_rustls(args.bind_address, tls)
        .serve(webhook_router(state).into_make_service());

    let metrics_listener = tokio::net::TcpListener::bind(args.metrics_bind_address)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", args.metrics_bind_address))?;

    info!(
        webhook = %args.bind_address,
        metrics = %args.metrics_bind_address,
        "Serving admission webhooks"
    );

    tokio::select! {
        result = webhook => {
            error!("CRITICAL: Webhook server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Webhook server exited unexpectedly without error")
        }
        result = async { axum::serve(metrics_listener, metrics_router()).await } => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        () = run_periodic_resync(reconciler, args.resync_interval()) => {
            anyhow::bail!("Resync loop exited unexpectedly")
        }
        result = shutdown_signal() => {
            info!("Shutting down");
            result
        }
    }
}

/// Resync every `period`, never returning. Idles when resync is disabled.
async fn run_periodic_resync(
    reconciler: Option<Arc<IngressDnsReconciler>>,
    period: Option<Duration>,
) {
    let (Some(reconciler), Some(period)) = (reconciler, period) else {
        info!("Periodic resync disabled");
        return std::future::pending().await;
    };

    info!(interval = ?period, "Periodic resync enabled");

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // Failures are logged and counted by resync(); the next tick retries
        if reconciler.resync().await.is_err() {
            debug!("Resync will be retried at the next interval");
        }
    }
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                info!("Received SIGINT");
                result?;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM (pod termination)");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received SIGINT");
    }

    Ok(())
}
