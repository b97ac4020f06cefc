//! In-memory recipe repository
//!
//! Used when the service runs without a database and by tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pillar_core::domain::recipe::Recipe;
use pillar_core::dto::recipe::RecipeFilter;
use tokio::sync::RwLock;

use super::{RecipeFields, RecipeRepository, search_term};

#[derive(Default)]
struct State {
    next_id: i32,
    recipes: BTreeMap<i32, Recipe>,
}

#[derive(Default)]
pub struct MemoryRecipeRepository {
    state: RwLock<State>,
}

impl MemoryRecipeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeRepository for MemoryRecipeRepository {
    async fn create(&self, fields: RecipeFields) -> Result<Recipe, sqlx::Error> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let recipe = fields.into_recipe(state.next_id);
        state.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Recipe>, sqlx::Error> {
        Ok(self.state.read().await.recipes.get(&id).cloned())
    }

    async fn list(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>, sqlx::Error> {
        let term = search_term(filter);
        let state = self.state.read().await;

        Ok(state
            .recipes
            .values()
            .filter(|r| filter.user_id.is_none_or(|user_id| r.user_id == user_id))
            .filter(|r| term.is_none_or(|term| r.matches_term(term)))
            .cloned()
            .collect())
    }

    async fn update(&self, id: i32, fields: RecipeFields) -> Result<Option<Recipe>, sqlx::Error> {
        let mut state = self.state.write().await;
        match state.recipes.get_mut(&id) {
            Some(existing) => {
                *existing = fields.into_recipe(id);
                Ok(Some(existing.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: i32) -> Result<bool, sqlx::Error> {
        Ok(self.state.write().await.recipes.remove(&id).is_some())
    }
}
