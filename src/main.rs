use brandpay_backend::api;
use brandpay_backend::config::{Config, LogFormat};
use brandpay_backend::state::AppState;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.server.log_format);

    tracing::info!("Starting brandpay backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Terminal status policy: {:?}", config.terminal_status_policy);

    let state = AppState::from_config(&config).await?;
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
