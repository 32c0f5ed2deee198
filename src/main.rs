use chartfeed::config::Config;
use chartfeed::orchestrator::Orchestrator;
use chartfeed::provider::HttpTransport;
use chartfeed::routes;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let config = Config::from_env()?;
    let providers: Vec<&str> = config.providers.iter().map(|p| p.kind.name()).collect();
    tracing::info!(?providers, max_candles = config.max_candles, "configuration loaded");

    let transport = HttpTransport::new()?;
    let orchestrator = Arc::new(Orchestrator::from_config(&config, transport)?);
    let app = routes::router(orchestrator);

    tracing::info!("Listening on port {}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
