//! Recipe API endpoints

use pillar_core::domain::recipe::Recipe;
use pillar_core::dto::recipe::{RecipeDto, RecipeFilter};

use crate::RecipesClient;
use crate::error::Result;

impl RecipesClient {
    /// List recipes, optionally filtered by user and search term
    pub async fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
        let url = format!("{}/recipes", self.base_url);
        let response = self.client.get(&url).query(filter).send().await?;

        self.handle_response(response).await
    }

    /// Get a recipe by ID
    pub async fn get_recipe(&self, id: i32) -> Result<Recipe> {
        let url = format!("{}/recipes/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Create a recipe
    ///
    /// # Returns
    /// The stored recipe with its generated id
    pub async fn create_recipe(&self, req: &RecipeDto) -> Result<Recipe> {
        let url = format!("{}/recipes", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Replace the contents of a recipe
    pub async fn update_recipe(&self, id: i32, req: &RecipeDto) -> Result<Recipe> {
        let url = format!("{}/recipes/{}", self.base_url, id);
        let response = self.client.put(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Delete a recipe
    pub async fn delete_recipe(&self, id: i32) -> Result<()> {
        let url = format!("{}/recipes/{}", self.base_url, id);
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
