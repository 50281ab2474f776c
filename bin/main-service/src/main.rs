use anyhow::{Context, Result};
use registry_bus::{
    Announcement, AnnouncementBus, Lifecycle, LifecycleConfig, Registration, RegistrationChannel,
};
use registry_core::{Handle, RegistryMetrics, ServiceRegistry};
use registry_proxy::{HealthCheckConfig, HealthChecker, ProxySelector};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod status;

use config::{LogFormat, MainConfig};

const REGISTRATION_QUEUE: usize = 64;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = MainConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    info!("Starting main-service {}...", config.service_id);

    let metrics = RegistryMetrics::new()?;
    let registry = Arc::new(ServiceRegistry::new(config.full_ttl, metrics));
    info!(
        "Service registry initialized (ttl {} ticks of {:?})",
        config.full_ttl,
        config.sweep_period()
    );

    let checker = HealthChecker::new(HealthCheckConfig {
        timeout: config.probe_timeout(),
    });
    let selector = Arc::new(ProxySelector::new(registry.clone(), checker));

    let bus = AnnouncementBus::default();
    let (registrations, registration_listener) =
        RegistrationChannel::new(registry.clone(), REGISTRATION_QUEUE);

    let identity: Handle = Arc::new(config.advertised_endpoint());
    let lifecycle = Lifecycle::start(
        registry.clone(),
        &bus,
        registration_listener,
        Some(Announcement::new(config.service_id.clone(), identity)),
        LifecycleConfig {
            sweep_period: config.sweep_period(),
            announce_ticks: config.announce_ticks(),
        },
    );

    for backend in &config.static_backends {
        let handle: Handle = Arc::new(backend.endpoint.clone());
        if let Err(e) = registrations
            .register(Registration::new(backend.service_id.clone(), handle))
            .await
        {
            error!("Failed to register static backend {}: {}", backend.service_id, e);
        }
    }
    info!("Queued {} static backends", config.static_backends.len());

    let listener = TcpListener::bind(config.status_listen)
        .await
        .with_context(|| format!("Failed to bind status listener {}", config.status_listen))?;
    let (status_shutdown, status_signal) = watch::channel(false);
    let status_task = tokio::spawn(status::serve(listener, selector, status_signal));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting...");

    let _ = status_shutdown.send(true);
    if let Err(e) = status_task.await {
        error!("Status server ended abnormally: {}", e);
    }
    lifecycle.stop().await;

    Ok(())
}
