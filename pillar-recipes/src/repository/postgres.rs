//! PostgreSQL recipe repository

use async_trait::async_trait;
use pillar_core::domain::recipe::Recipe;
use pillar_core::dto::recipe::RecipeFilter;
use sqlx::PgPool;

use super::{RecipeFields, RecipeRepository, search_term};

const COLUMNS: &str = r#"id, "userId", title, description, servings, ingredients, instructions, images"#;

pub struct PgRecipeRepository {
    pool: PgPool,
}

impl PgRecipeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipeRepository for PgRecipeRepository {
    async fn create(&self, fields: RecipeFields) -> Result<Recipe, sqlx::Error> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            INSERT INTO recipe ("userId", title, description, servings, ingredients, instructions, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(fields.user_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.servings)
        .bind(&fields.ingredients)
        .bind(&fields.instructions)
        .bind(&fields.images)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Recipe>, sqlx::Error> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {} FROM recipe WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>, sqlx::Error> {
        let pattern = search_term(filter).map(like_pattern);

        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            SELECT {}
            FROM recipe
            WHERE ($1::INTEGER IS NULL OR "userId" = $1)
              AND ($2::TEXT IS NULL OR title ILIKE $2 OR description ILIKE $2)
            ORDER BY id
            "#,
            COLUMNS
        ))
        .bind(filter.user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update(&self, id: i32, fields: RecipeFields) -> Result<Option<Recipe>, sqlx::Error> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            UPDATE recipe
            SET "userId" = $1, title = $2, description = $3, servings = $4,
                ingredients = $5, instructions = $6, images = $7
            WHERE id = $8
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(fields.user_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.servings)
        .bind(&fields.ingredients)
        .bind(&fields.instructions)
        .bind(&fields.images)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn delete(&self, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recipe WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards in the term
/// taken literally
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: i32,
    #[sqlx(rename = "userId")]
    user_id: i32,
    title: String,
    description: String,
    servings: Option<i32>,
    ingredients: Vec<String>,
    instructions: Vec<String>,
    images: Vec<String>,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Recipe {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            servings: row.servings,
            ingredients: row.ingredients,
            instructions: row.instructions,
            images: row.images,
        }
    }
}
