use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chirp::{
    api::{create_router, AppState},
    config::Config,
    db::{self, PostRepository, SessionRepository},
    error::AppError,
};

const MAIL_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chirp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Chirp server v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!("✅ Configuration loaded");

    let db = db::connect(&config).await?;
    tracing::info!("✅ Database connected: {}", config.database_url);

    db::migrate(&db).await?;
    tracing::info!("✅ Database migrations completed");

    // Search backend, mail worker and reset token signer
    let (state, mail_worker) = AppState::from_config(db.clone(), config.clone())?;
    state.index.log_status().await;

    if config.reindex_on_startup {
        let count = PostRepository::reindex(&state.db, &state.index).await?;
        tracing::info!("✅ Search index rebuilt ({} posts)", count);
    }

    // Spawn background task for session cleanup
    {
        let db_clone = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600)); // Every hour
            loop {
                interval.tick().await;
                match SessionRepository::cleanup_expired(&db_clone).await {
                    Ok(n) => tracing::debug!("🧹 {} expired sessions cleaned up", n),
                    Err(e) => tracing::error!("❌ Session cleanup failed: {}", e),
                }
            }
        });
        tracing::info!("✅ Session cleanup task started (runs hourly)");
    }

    // Build router
    let app = create_router(state);

    // Bind and serve
    let addr = config.server_address();
    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check: http://{}/api/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    // The router and every state clone are gone, so the mail queue can only drain now
    match tokio::time::timeout(MAIL_DRAIN_TIMEOUT, mail_worker).await {
        Ok(Ok(())) => tracing::info!("✅ Mail queue drained"),
        Ok(Err(e)) => tracing::error!("❌ Mail worker failed: {}", e),
        Err(_) => tracing::warn!("Mail queue not drained after {:?}, pending mail is lost", MAIL_DRAIN_TIMEOUT),
    }

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
