//! Tailoring shop backend
//!
//! Orders, material stock and customer measurements behind a JWT-protected
//! REST API. Order changes and the stock reservations they imply commit in a
//! single transaction.

use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use crate::config::Config;

use error::AppResult;
use services::{
    notification::notifier_from_config, AuditSink, LogAuditSink, MaterialService, Notifier,
    OrderService, PgAuditSink,
};
use store::PgStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub notifier: Arc<dyn Notifier>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    /// Build state with the collaborators selected by configuration
    pub fn new(db: PgPool, config: Config) -> AppResult<Self> {
        let notifier = notifier_from_config(&config.notifications)?;
        let audit: Arc<dyn AuditSink> = if config.audit.enabled {
            Arc::new(PgAuditSink::new(db.clone()))
        } else {
            Arc::new(LogAuditSink)
        };

        Ok(Self {
            db,
            config: Arc::new(config),
            notifier,
            audit,
        })
    }

    pub fn store(&self) -> PgStore {
        PgStore::new(self.db.clone())
    }

    pub fn order_service(&self) -> OrderService<PgStore> {
        OrderService::new(self.store(), self.notifier.clone(), self.audit.clone())
    }

    pub fn material_service(&self) -> MaterialService<PgStore> {
        MaterialService::new(self.store(), self.notifier.clone(), self.audit.clone())
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Atelier Tailoring Shop API v1"
}
