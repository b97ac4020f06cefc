//! Recipe domain types

use serde::{Deserialize, Serialize};

/// A stored recipe
///
/// Serialized with camelCase keys so `user_id` travels as `userId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub servings: Option<i32>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub images: Vec<String>,
}

impl Recipe {
    /// Case-insensitive substring match against title or description
    pub fn matches_term(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pancakes() -> Recipe {
        Recipe {
            id: 1,
            user_id: 7,
            title: "Buttermilk Pancakes".to_string(),
            description: "Fluffy weekend breakfast".to_string(),
            servings: Some(4),
            ingredients: vec!["flour".to_string(), "buttermilk".to_string()],
            instructions: vec!["mix".to_string(), "fry".to_string()],
            images: vec![],
        }
    }

    #[test]
    fn test_matches_term_ignores_case() {
        let recipe = pancakes();
        assert!(recipe.matches_term("PANCAKE"));
        assert!(recipe.matches_term("breakfast"));
        assert!(!recipe.matches_term("waffle"));
    }

    #[test]
    fn test_serializes_user_id_as_camel_case() {
        let json = serde_json::to_value(pancakes()).unwrap();
        assert_eq!(json["userId"], 7);
        assert!(json.get("user_id").is_none());
    }
}
