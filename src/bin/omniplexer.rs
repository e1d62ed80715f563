mod omniplexer_cli;

use clap::Parser as _;

use omniplexer_cli::attach::{attach_otel, init_logging};
use omniplexer_cli::cli::OmniplexerCliArgs;
use omniplexer::gateway::http::{GatewayHttpState, router};
use omniplexer::{GatewayConfig, Omniplexer, ServerRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = OmniplexerCliArgs::parse();

    let _otel_guard = attach_otel(args.otel_enabled(), args.otel_endpoint.as_deref(), args.json_logs)?;
    if !args.otel_enabled() {
        init_logging(args.json_logs)?;
    }

    let config = GatewayConfig::from_path(&args.config)?;
    let listen = args.listen_addr(config.listen.as_deref());
    let registry = ServerRegistry::from_config(&config)?;
    tracing::info!(
        config = %args.config.display(),
        servers = registry.len(),
        "loaded upstream servers"
    );

    let state = GatewayHttpState::new(Omniplexer::new(registry)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(listen = %listen, "omniplexer listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
