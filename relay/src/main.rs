use anyhow::anyhow;
use clap::Parser;
use relay::{Application, Config, config::Args, telemetry};
use tokio::signal;

/// Resolves once the process is asked to stop. A listener that cannot be installed is logged
/// and never fires, so the other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl+C: {e}");
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
                tracing::warn!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
    };
    tracing::info!(signal = received, "Draining in-flight uploads before exit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // TLS clients (the OTLP exporter among them) need a process-wide provider
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("A rustls crypto provider was already installed"))?;

    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!(
            "{}: valid. Would listen on {} and relay to {} (model {}, language {}).",
            args.config,
            config.bind_address(),
            config.upstream.url,
            config.upstream.model,
            config.upstream.language
        );
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    tracing::debug!(config_file = %args.config, "Configuration loaded");

    Application::new(config)?.serve(shutdown_signal()).await
}
