//! Recipe command handlers
//!
//! Handles listing, viewing, creating, updating and deleting recipes
//! through the recipes API.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::*;
use pillar_client::RecipesClient;
use pillar_core::domain::recipe::Recipe;
use pillar_core::dto::recipe::{RecipeDto, RecipeFilter};

use crate::config::Config;

/// Recipe subcommands
#[derive(Subcommand)]
pub enum RecipeCommands {
    /// List recipes
    List {
        /// Only recipes owned by this user
        #[arg(short, long)]
        user_id: Option<i32>,

        /// Case-insensitive match on title or description
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Get recipe details
    Get {
        id: i32,
    },
    /// Create a recipe
    Create(RecipeArgs),
    /// Replace a recipe
    Update {
        id: i32,

        #[command(flatten)]
        recipe: RecipeArgs,
    },
    /// Delete a recipe
    Delete {
        id: i32,
    },
}

/// Recipe contents, from a JSON file and/or flags
///
/// Flags override the matching fields read from the file.
#[derive(Args, Debug, Default)]
pub struct RecipeArgs {
    /// JSON file holding the recipe
    #[arg(short, long)]
    file: Option<PathBuf>,

    #[arg(short, long)]
    user_id: Option<i32>,

    #[arg(short, long)]
    title: Option<String>,

    #[arg(short, long)]
    description: Option<String>,

    #[arg(long)]
    servings: Option<i32>,

    /// Repeat for each ingredient
    #[arg(long = "ingredient")]
    ingredients: Vec<String>,

    /// Repeat for each step
    #[arg(long = "instruction")]
    instructions: Vec<String>,

    /// Repeat for each image URL
    #[arg(long = "image")]
    images: Vec<String>,
}

impl RecipeArgs {
    fn into_dto(self) -> Result<RecipeDto> {
        let base = match &self.file {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read recipe file: {}", path.display()))?;
                serde_json::from_str(&source)
                    .with_context(|| format!("Invalid recipe file: {}", path.display()))?
            }
            None => RecipeDto::default(),
        };

        Ok(self.apply(base))
    }

    fn apply(self, mut dto: RecipeDto) -> RecipeDto {
        if self.user_id.is_some() {
            dto.user_id = self.user_id;
        }
        if let Some(title) = self.title {
            dto.title = title;
        }
        if let Some(description) = self.description {
            dto.description = description;
        }
        if self.servings.is_some() {
            dto.servings = self.servings;
        }
        if !self.ingredients.is_empty() {
            dto.ingredients = self.ingredients;
        }
        if !self.instructions.is_empty() {
            dto.instructions = self.instructions;
        }
        if !self.images.is_empty() {
            dto.images = self.images;
        }
        dto
    }
}

/// Handle recipe commands
pub async fn handle_recipe_command(command: RecipeCommands, config: &Config) -> Result<()> {
    let client = RecipesClient::new(&config.recipes_url);

    match command {
        RecipeCommands::List { user_id, search } => {
            let filter = RecipeFilter {
                user_id,
                search_term: search,
            };
            list_recipes(&client, &filter).await
        }
        RecipeCommands::Get { id } => get_recipe(&client, id).await,
        RecipeCommands::Create(args) => create_recipe(&client, args).await,
        RecipeCommands::Update { id, recipe } => update_recipe(&client, id, recipe).await,
        RecipeCommands::Delete { id } => delete_recipe(&client, id).await,
    }
}

async fn list_recipes(client: &RecipesClient, filter: &RecipeFilter) -> Result<()> {
    let recipes = client.list_recipes(filter).await?;

    if recipes.is_empty() {
        println!("{}", "No recipes found.".yellow());
    } else {
        println!("{}", format!("Found {} recipe(s):", recipes.len()).bold());
        println!();
        for recipe in &recipes {
            print_recipe_summary(recipe);
        }
    }

    Ok(())
}

async fn get_recipe(client: &RecipesClient, id: i32) -> Result<()> {
    let recipe = client
        .get_recipe(id)
        .await
        .with_context(|| format!("Failed to get recipe {}", id))?;

    print_recipe_details(&recipe);

    Ok(())
}

async fn create_recipe(client: &RecipesClient, args: RecipeArgs) -> Result<()> {
    let dto = args.into_dto()?;
    let recipe = client.create_recipe(&dto).await?;

    println!("{}", "✓ Recipe created successfully!".green().bold());
    println!("  ID:    {}", recipe.id.to_string().cyan());
    println!("  Title: {}", recipe.title.bold());

    Ok(())
}

async fn update_recipe(client: &RecipesClient, id: i32, args: RecipeArgs) -> Result<()> {
    let dto = args.into_dto()?;
    let recipe = client
        .update_recipe(id, &dto)
        .await
        .with_context(|| format!("Failed to update recipe {}", id))?;

    println!("{}", "✓ Recipe updated successfully!".green().bold());
    print_recipe_details(&recipe);

    Ok(())
}

async fn delete_recipe(client: &RecipesClient, id: i32) -> Result<()> {
    client
        .delete_recipe(id)
        .await
        .with_context(|| format!("Failed to delete recipe {}", id))?;

    println!(
        "{}",
        format!("✓ Recipe {} deleted successfully!", id).green().bold()
    );

    Ok(())
}

fn print_recipe_summary(recipe: &Recipe) {
    println!("  {} {}", "▸".cyan(), recipe.title.bold());
    println!("    ID:   {}", recipe.id.to_string().dimmed());
    println!("    User: {}", recipe.user_id.to_string().dimmed());
    println!("    {}", recipe.description.dimmed());
    println!();
}

fn print_recipe_details(recipe: &Recipe) {
    println!("{}", "Recipe Details:".bold());
    println!("  ID:          {}", recipe.id.to_string().cyan());
    println!("  Title:       {}", recipe.title.bold());
    println!("  User:        {}", recipe.user_id);
    println!("  Description: {}", recipe.description);
    if let Some(servings) = recipe.servings {
        println!("  Servings:    {}", servings);
    }

    println!("  Ingredients:");
    for ingredient in &recipe.ingredients {
        println!("    - {}", ingredient);
    }

    println!("  Instructions:");
    for (step, instruction) in recipe.instructions.iter().enumerate() {
        println!("    {}. {}", step + 1, instruction);
    }

    if !recipe.images.is_empty() {
        println!("  Images:      {}", recipe.images.join(", ").dimmed());
    }
}
