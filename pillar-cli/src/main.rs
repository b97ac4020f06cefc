//! Pillar CLI
//!
//! Synthesizes environment stacks and drives the recipes API.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pillar")]
#[command(about = "Pillar stack synthesis and recipes CLI", long_about = None)]
struct Cli {
    /// Recipes service URL
    #[arg(
        long,
        global = true,
        env = "PILLAR_RECIPES_URL",
        default_value = "http://localhost:9000"
    )]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        recipes_url: cli.url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_synth() {
        let cli = Cli::try_parse_from(["pillar", "synth", "--environment", "dev"]).unwrap();
        assert!(matches!(cli.command, Commands::Synth { .. }));
    }

    #[test]
    fn test_rejects_unknown_environment() {
        assert!(Cli::try_parse_from(["pillar", "synth", "--environment", "staging"]).is_err());
    }
}
