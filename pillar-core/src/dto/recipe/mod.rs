//! Recipe DTOs

use serde::{Deserialize, Serialize};

/// Body of a create or update request
///
/// `user_id` is optional on the wire so a missing value surfaces as a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDto {
    pub user_id: Option<i32>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub servings: Option<i32>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Query parameters for listing recipes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

impl RecipeFilter {
    pub fn by_user(user_id: i32) -> Self {
        Self {
            user_id: Some(user_id),
            search_term: None,
        }
    }

    pub fn by_term(term: impl Into<String>) -> Self {
        Self {
            user_id: None,
            search_term: Some(term.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dto_defaults_optional_lists() {
        let dto: RecipeDto = serde_json::from_str(
            r#"{"userId": 3, "title": "Soup", "description": "Hot"}"#,
        )
        .unwrap();

        assert_eq!(dto.user_id, Some(3));
        assert!(dto.images.is_empty());
        assert!(dto.servings.is_none());
    }

    #[test]
    fn test_filter_skips_empty_fields() {
        let json = serde_json::to_value(RecipeFilter::by_user(2)).unwrap();
        assert_eq!(json, serde_json::json!({ "userId": 2 }));
    }
}
