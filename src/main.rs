//! Velero CRD installer
//!
//! Main entry point. Loads the desired CRD bundle, connects to the
//! Kubernetes API server, converges the CRDs once and exits.

use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use velero_crd_installer::{
    config::{Config, LogFormat},
    crd::Bundle,
    metrics,
    reconcilers::{
        crds::{self, InstallSummary},
        established,
    },
    store::KubeCrdStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(config.log_format);

    info!("Starting Velero CRD installer");

    let bundle = match &config.bundle_path {
        Some(path) => Bundle::from_path(path)?,
        None => Bundle::embedded()?,
    };
    info!(
        "Loaded {} CRD manifests from {} bundle (digest {})",
        bundle.len(),
        bundle.source(),
        bundle.digest()
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    if config.dry_run {
        warn!("Dry run enabled, CRD writes will not be persisted");
    }

    let result = tokio::select! {
        result = run(&config, &bundle, client) => result.map_err(anyhow::Error::from),
        _ = shutdown_signal() => {
            Err(anyhow::anyhow!("interrupted before CRD installation completed"))
        }
    };

    if let Some(path) = &config.metrics_textfile {
        if let Err(e) = metrics::write_textfile(path) {
            error!("Failed to write metrics to {}: {}", path.display(), e);
        }
    }

    let summary = result?;
    info!(
        "Velero CRD installer finished, {} of {} CRDs written",
        summary.writes(),
        summary.results.len()
    );
    Ok(())
}

/// Converge the bundle, then optionally wait for the CRDs to be served
async fn run(
    config: &Config,
    bundle: &Bundle,
    client: Client,
) -> velero_crd_installer::Result<InstallSummary> {
    let store = KubeCrdStore::new(client.clone(), &config.field_manager, config.dry_run);
    let summary = crds::install_crds(&store, bundle.manifests()).await?;

    if config.wait_established {
        if config.dry_run {
            info!("Skipping establishment wait during dry run");
        } else {
            established::wait_for_established(client, &bundle.names(), config.established_timeout)
                .await?;
        }
    }

    Ok(summary)
}

/// Initialize tracing subscriber
fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,velero_crd_installer=debug,kube=warn,hyper=warn")
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received CTRL+C signal, abandoning CRD installation");
        }
        _ = terminate => {
            warn!("Received SIGTERM signal, abandoning CRD installation");
        }
    }
}
