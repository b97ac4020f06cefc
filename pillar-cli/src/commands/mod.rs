//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod environments;
mod recipe;
mod synth;

pub use recipe::RecipeCommands;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use pillar_infra::Environment;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize the stack template for one environment
    Synth {
        /// Target environment (demo, dev, prod, prototype)
        #[arg(short, long, env = "PILLAR_ENVIRONMENT")]
        environment: Environment,

        /// Stack configuration file. Default: ./pillar.toml when present
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the template here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the deployment environments
    Environments,
    /// Recipe management
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Synth {
            environment,
            config,
            output,
        } => synth::handle_synth_command(environment, config, output),
        Commands::Environments => {
            environments::list_environments();
            Ok(())
        }
        Commands::Recipe { command } => recipe::handle_recipe_command(command, config).await,
    }
}
