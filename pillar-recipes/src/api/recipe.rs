//! Recipe API Handlers
//!
//! HTTP endpoints for recipe management.

use axum::{Json, extract::State, http::StatusCode};
use pillar_core::domain::recipe::Recipe;
use pillar_core::dto::recipe::{RecipeDto, RecipeFilter};

use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::repository::SharedRepository;
use crate::service::recipe_service;

/// GET /recipes
/// List recipes, optionally filtered by `userId` and `searchTerm`
pub async fn list_recipes(
    State(repo): State<SharedRepository>,
    ApiQuery(filter): ApiQuery<RecipeFilter>,
) -> ApiResult<Json<Vec<Recipe>>> {
    tracing::debug!("Listing recipes: {:?}", filter);

    let recipes = recipe_service::list_recipes(repo.as_ref(), &filter).await?;

    Ok(Json(recipes))
}

/// GET /recipes/{id}
pub async fn get_recipe(
    State(repo): State<SharedRepository>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Recipe>> {
    tracing::debug!("Getting recipe: {}", id);

    let recipe = recipe_service::get_recipe(repo.as_ref(), id).await?;

    Ok(Json(recipe))
}

/// POST /recipes
pub async fn create_recipe(
    State(repo): State<SharedRepository>,
    ApiJson(req): ApiJson<RecipeDto>,
) -> ApiResult<(StatusCode, Json<Recipe>)> {
    tracing::info!("Creating recipe: {}", req.title);

    let recipe = recipe_service::create_recipe(repo.as_ref(), req).await?;

    Ok((StatusCode::CREATED, Json(recipe)))
}

/// PUT /recipes/{id}
pub async fn update_recipe(
    State(repo): State<SharedRepository>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(req): ApiJson<RecipeDto>,
) -> ApiResult<Json<Recipe>> {
    tracing::info!("Updating recipe: {}", id);

    let recipe = recipe_service::update_recipe(repo.as_ref(), id, req).await?;

    Ok(Json(recipe))
}

/// DELETE /recipes/{id}
pub async fn delete_recipe(
    State(repo): State<SharedRepository>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting recipe: {}", id);

    recipe_service::delete_recipe(repo.as_ref(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}
