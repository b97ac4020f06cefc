//! Recipe Service
//!
//! Business logic for recipe management.

use pillar_core::domain::recipe::Recipe;
use pillar_core::dto::recipe::{RecipeDto, RecipeFilter};

use crate::repository::{RecipeFields, RecipeRepository};

const MAX_TITLE_LENGTH: usize = 255;

/// Service error type
#[derive(Debug)]
pub enum RecipeError {
    NotFound(i32),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for RecipeError {
    fn from(err: sqlx::Error) -> Self {
        RecipeError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, RecipeError>;

/// Create a new recipe
pub async fn create_recipe(repo: &dyn RecipeRepository, req: RecipeDto) -> Result<Recipe> {
    let fields = validate_recipe_request(req)?;

    let recipe = repo.create(fields).await?;

    tracing::info!("Recipe created: {} ({})", recipe.title, recipe.id);

    Ok(recipe)
}

/// Get a recipe by ID
pub async fn get_recipe(repo: &dyn RecipeRepository, id: i32) -> Result<Recipe> {
    repo.find_by_id(id)
        .await?
        .ok_or(RecipeError::NotFound(id))
}

/// List recipes matching a filter
pub async fn list_recipes(repo: &dyn RecipeRepository, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
    let recipes = repo.list(filter).await?;
    Ok(recipes)
}

/// Replace the contents of a recipe
pub async fn update_recipe(repo: &dyn RecipeRepository, id: i32, req: RecipeDto) -> Result<Recipe> {
    let fields = validate_recipe_request(req)?;

    let recipe = repo
        .update(id, fields)
        .await?
        .ok_or(RecipeError::NotFound(id))?;

    tracing::info!("Recipe updated: {}", id);

    Ok(recipe)
}

/// Delete a recipe
pub async fn delete_recipe(repo: &dyn RecipeRepository, id: i32) -> Result<()> {
    let deleted = repo.delete(id).await?;

    if !deleted {
        return Err(RecipeError::NotFound(id));
    }

    tracing::info!("Recipe deleted: {}", id);

    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_recipe_request(req: RecipeDto) -> Result<RecipeFields> {
    let invalid = |msg: &str| Err(RecipeError::ValidationError(msg.to_string()));

    let Some(user_id) = req.user_id else {
        return invalid("userId is required");
    };

    if req.title.trim().is_empty() {
        return invalid("Recipe title cannot be empty");
    }

    if req.title.chars().count() > MAX_TITLE_LENGTH {
        return invalid("Recipe title is too long (max 255 characters)");
    }

    if req.description.trim().is_empty() {
        return invalid("Recipe description cannot be empty");
    }

    if req.ingredients.is_empty() {
        return invalid("Recipe needs at least one ingredient");
    }

    if req.instructions.is_empty() {
        return invalid("Recipe needs at least one instruction");
    }

    if req.servings.is_some_and(|servings| servings <= 0) {
        return invalid("Recipe servings must be greater than 0");
    }

    Ok(RecipeFields {
        user_id,
        title: req.title,
        description: req.description,
        servings: req.servings,
        ingredients: req.ingredients,
        instructions: req.instructions,
        images: req.images,
    })
}
