//! Route definitions for the tailoring shop backend

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Orders (protected, except public tracking)
        .nest("/orders", order_routes(state.clone()))
        // Materials and stock movements (protected)
        .nest("/materials", material_routes(state.clone()))
        // Customer measurement history (protected)
        .nest("/customers", customer_routes(state))
}

/// Order routes
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/trash", get(handlers::list_trashed_orders))
        .route(
            "/:order_id",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/:order_id/restore", put(handlers::restore_order))
        .route("/:order_id/force", delete(handlers::force_delete_order))
        .route("/:order_id/movements", get(handlers::get_order_movements))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        // Public tracking page (added after the auth layer)
        .route("/track/:code", get(handlers::track_order))
}

/// Material routes (protected)
fn material_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_materials).post(handlers::create_material))
        .route("/low-stock", get(handlers::list_low_stock))
        .route(
            "/:material_id",
            get(handlers::get_material)
                .put(handlers::update_material)
                .delete(handlers::delete_material),
        )
        .route("/:material_id/restore", put(handlers::restore_material))
        .route("/:material_id/adjust", post(handlers::adjust_stock))
        .route("/:material_id/movements", get(handlers::list_movements))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Customer routes (protected)
fn customer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:customer_id/measurements",
            get(handlers::get_measurement_history),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
