//! Pillar Recipes Client
//!
//! A type-safe HTTP client for the recipes service API.
//!
//! # Example
//!
//! ```no_run
//! use pillar_client::RecipesClient;
//! use pillar_core::dto::recipe::RecipeFilter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RecipesClient::new("http://localhost:9000");
//!
//!     for recipe in client.list_recipes(&RecipeFilter::by_user(1)).await? {
//!         println!("{}: {}", recipe.id, recipe.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod recipes;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the recipes API
#[derive(Debug, Clone)]
pub struct RecipesClient {
    /// Base URL of the service (e.g., "http://localhost:9000")
    base_url: String,
    client: Client,
}

impl RecipesClient {
    /// Create a new client
    ///
    /// # Example
    /// ```
    /// use pillar_client::RecipesClient;
    ///
    /// let client = RecipesClient::new("http://localhost:9000");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the service is up
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::debug!("Request failed with status {}: {}", status, body);

        Err(ClientError::api_error(status.as_u16(), error_message(body)))
    }
}

/// Message from an `{"error": "..."}` body, or the raw body otherwise
fn error_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| json.get("error")?.as_str().map(str::to_string))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = RecipesClient::new("http://localhost:9000/");
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = RecipesClient::with_client("http://localhost:9000", Client::new());
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_error_message_unwraps_json_error() {
        let body = r#"{"error":"Recipe 7 not found"}"#.to_string();
        assert_eq!(error_message(body), "Recipe 7 not found");
    }

    #[test]
    fn test_error_message_keeps_plain_body() {
        assert_eq!(error_message("Bad Gateway".to_string()), "Bad Gateway");
        assert_eq!(error_message(r#"{"detail":1}"#.to_string()), r#"{"detail":1}"#);
    }
}
