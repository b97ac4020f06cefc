//! Repository Module
//!
//! Data access layer for the recipes service. Storage backends implement
//! [`RecipeRepository`] so the service and API layers never depend on a
//! concrete store.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use pillar_core::domain::recipe::Recipe;
use pillar_core::dto::recipe::RecipeFilter;

pub use memory::MemoryRecipeRepository;
pub use postgres::PgRecipeRepository;

/// Validated recipe contents, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeFields {
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub servings: Option<i32>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub images: Vec<String>,
}

impl RecipeFields {
    pub fn into_recipe(self, id: i32) -> Recipe {
        Recipe {
            id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            servings: self.servings,
            ingredients: self.ingredients,
            instructions: self.instructions,
            images: self.images,
        }
    }
}

/// Storage for recipes
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Stores a new recipe and returns it with its generated id
    async fn create(&self, fields: RecipeFields) -> Result<Recipe, sqlx::Error>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Recipe>, sqlx::Error>;

    /// Recipes matching every filter criterion, ordered by id
    async fn list(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>, sqlx::Error>;

    /// Replaces a recipe's contents; `None` when the id is unknown
    async fn update(&self, id: i32, fields: RecipeFields) -> Result<Option<Recipe>, sqlx::Error>;

    /// Returns false when the id is unknown
    async fn delete(&self, id: i32) -> Result<bool, sqlx::Error>;
}

/// Repository handle shared by request handlers
pub type SharedRepository = Arc<dyn RecipeRepository>;

/// Search term with surrounding whitespace removed, `None` when blank
pub(crate) fn search_term(filter: &RecipeFilter) -> Option<&str> {
    filter
        .search_term
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
}
