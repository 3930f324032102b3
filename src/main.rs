//! TheLoveCraft storefront API server

use anyhow::Result;
use lovecraft_commerce::{build_router, AppConfig, AppState};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match config.nats_url.as_deref() {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, events will not be published"); None }
        },
        None => None,
    };

    let port = config.port;
    let state = AppState::new(db, config, nats)?;
    tracing::info!(
        razorpay = state.razorpay.is_some(), cashfree = state.cashfree.is_some(), shiprocket = state.shiprocket.is_some(),
        google = state.google.is_some(), cloudinary = state.cloudinary.is_some(), "integrations configured"
    );
    let app = build_router(state);

    tracing::info!("🎁 LoveCraft API listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
