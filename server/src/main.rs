use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventease_server::config::{Config, StoreKind};
use eventease_server::repository::{MemoryStore, PgStore, Store};
use eventease_server::routes::create_routes;
use eventease_server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("eventease_server=debug,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let store: Arc<dyn Store> = match config.store {
        StoreKind::Postgres => {
            let store = PgStore::connect(&config.database_url, config.max_connections).await?;
            tracing::info!("Successfully connected to database");
            store.migrate().await?;
            tracing::info!("Migrations run successfully");
            Arc::new(store)
        }
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if config.llm.is_none() {
        tracing::info!("No AI provider key configured; AI endpoints answer with placeholders");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app = create_routes(AppState::new(store, config));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
