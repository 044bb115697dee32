use socketioxide::SocketIo;

use murmur_chat::config::{AppConfig, StoreBackend};
use murmur_chat::store::{MemoryStore, PgStore, Store};
use murmur_chat::{router, socket, AppState};
use murmur_shared::clients::db::create_pool;
use murmur_shared::middleware::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("murmur-chat");

    let config = AppConfig::load()?;

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "prometheus recorder not installed, /metrics disabled");
            None
        }
    };

    match config.store {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            serve(config, PgStore::new(pool), metrics).await
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, data is lost on restart");
            serve(config, MemoryStore::new(), metrics).await
        }
    }
}

async fn serve<S: Store>(
    config: AppConfig,
    store: S,
    metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    let port = config.port;
    let state = AppState::new(config, store, metrics);

    let (sio_layer, io) = SocketIo::builder().build_layer();
    socket::handlers::register(&io, state.connections.clone());

    let app = router(state).layer(sio_layer);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "murmur-chat starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
