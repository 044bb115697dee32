use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use murmur_shared::middleware::metrics_middleware;

pub mod config;
pub mod events;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod socket;
pub mod store;

use config::AppConfig;
use services::ChatService;
use socket::ConnectionManager;
use store::Store;

pub struct AppState<S: Store> {
    pub config: AppConfig,
    pub chats: ChatService<S>,
    pub connections: Arc<ConnectionManager>,
    pub metrics: Option<PrometheusHandle>,
}

impl<S: Store> AppState<S> {
    pub fn new(config: AppConfig, store: S, metrics: Option<PrometheusHandle>) -> Arc<Self> {
        let connections = Arc::new(ConnectionManager::new());
        let chats = ChatService::new(store, connections.clone());
        Arc::new(Self { config, chats, connections, metrics })
    }
}

pub fn router<S: Store>(state: Arc<AppState<S>>) -> Router {
    let cors = if state.config.cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        // Health
        .route("/health", get(routes::health::health_check::<S>))
        .route("/metrics", get(routes::health::metrics::<S>))
        // Chats
        .route("/chats", get(routes::chats::list_chats::<S>).post(routes::chats::create_chat::<S>))
        .route(
            "/chats/:id",
            get(routes::chats::get_chat::<S>)
                .patch(routes::chats::rename_chat::<S>)
                .delete(routes::chats::leave_chat::<S>),
        )
        .route("/chats/:id/read", post(routes::chats::mark_read::<S>))
        .route("/chats/:id/messages", get(routes::messages::list_messages::<S>))
        .route("/unread-count", get(routes::chats::unread_count::<S>))
        // Messages
        .route("/messages", post(routes::messages::send_message::<S>))
        .route(
            "/messages/:id",
            axum::routing::patch(routes::messages::edit_message::<S>)
                .delete(routes::messages::delete_message::<S>),
        )
        .route_layer(axum::middleware::from_fn(metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
