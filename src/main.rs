mod api;
mod application;
mod domain;
mod infrastructure;
mod ports;

use api::AppState;
use infrastructure::{AppConfig, InMemoryTicketingStore, MySqlTicketingStore, StoreBackend};
use ports::TicketingStorePort;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting Ticket Booking Service...");

    let config = AppConfig::from_env()?;
    info!(
        "Configuration loaded: backend={:?}, seat lock timeout={:?}",
        config.store_backend, config.seat_lock_timeout
    );

    match config.store_backend {
        StoreBackend::MySql => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

            // 创建数据库连接池
            info!("Connecting to database...");
            let pool = MySqlPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;
            info!("Database connected successfully");

            let store = MySqlTicketingStore::new(Arc::new(pool), config.seat_lock_timeout);
            store.migrate().await?;
            info!("Database migrations applied");

            serve(Arc::new(store), &config).await
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store, data is lost on shutdown");
            let store = InMemoryTicketingStore::new(config.seat_lock_timeout);
            serve(Arc::new(store), &config).await
        }
    }
}

async fn serve<R: TicketingStorePort>(store: Arc<R>, config: &AppConfig) -> anyhow::Result<()> {
    // 创建路由
    let app = api::create_router(AppState::new(store));

    // 启动服务器
    let addr = config.bind_addr();
    info!("Server listening on {}", addr);
    info!("Available endpoints:");
    info!("  GET  /health - Health check");
    info!("  POST /api/bookings - Book seats");
    info!("  POST /api/refunds - Request a refund");
    info!("  POST /api/refunds/:refund_id/process - Approve or reject a refund");
    info!("  GET  /api/events - Upcoming events");
    info!("  POST /api/gate/tickets/:ticket_id/mark-used - Admit a ticket");
    info!("  POST /api/support/cases - Open a support case");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
