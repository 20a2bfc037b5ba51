use clap::Parser;
use computation_coordinator::config::CoordinatorConfig;
use computation_coordinator::coordinator::service::Coordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = CoordinatorConfig::parse();
    tracing::info!("Starting coordinator on {}", config.bind);
    match &config.domain {
        Some(domain) => tracing::info!("Serving domain {}", domain),
        None => tracing::info!("Domain will be taken from the first registered node"),
    }

    // 1. Components and background jobs:
    let coordinator = Coordinator::new(config.clone());
    let _jobs = coordinator.start();

    // 2. HTTP Router:
    let app = coordinator.router();

    // 3. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
