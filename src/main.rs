use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sankhya_partners::config::AppConfig;
use sankhya_partners::handlers::AppState;
use sankhya_partners::services::erp::SankhyaClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sankhya_partners=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(sankhya = ?config.sankhya, "Configuration loaded");

    let client = SankhyaClient::new(config.sankhya.clone())?;
    let state = AppState {
        client: Arc::new(client),
    };

    let app = sankhya_partners::create_app(state, &config.cors_origins);

    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Starting partner API on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
