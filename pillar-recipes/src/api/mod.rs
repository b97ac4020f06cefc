//! API Module
//!
//! HTTP API layer for the recipes service.

pub mod error;
pub mod extract;
pub mod health;
pub mod recipe;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::repository::SharedRepository;

/// Create the main API router with all endpoints
pub fn create_router(repo: SharedRepository) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/recipes",
            get(recipe::list_recipes).post(recipe::create_recipe),
        )
        .route(
            "/recipes/{id}",
            get(recipe::get_recipe)
                .put(recipe::update_recipe)
                .delete(recipe::delete_recipe),
        )
        .with_state(repo)
        .layer(TraceLayer::new_for_http())
}
