//! Synth command handler
//!
//! Builds the stack for an environment and writes its template as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::*;
use pillar_infra::{Environment, PillarStack, StackConfig};

const DEFAULT_CONFIG_FILE: &str = "pillar.toml";

pub fn handle_synth_command(
    environment: Environment,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let stack = PillarStack::synthesize(environment, &config)
        .with_context(|| format!("Failed to synthesize the {} stack", environment))?;
    let json = stack.template().to_json_pretty()?;

    match output {
        Some(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("Failed to write template: {}", path.display()))?;
            print_summary(&stack, &path);
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Reads the stack configuration
///
/// Without an explicit path, `pillar.toml` is used when it exists and the
/// default configuration otherwise.
fn load_config(path: Option<&Path>) -> Result<StackConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
        None => {
            tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
            return Ok(StackConfig::default());
        }
    };

    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&source).with_context(|| format!("Invalid config file: {}", path.display()))
}

fn parse_config(source: &str) -> Result<StackConfig> {
    Ok(StackConfig::from_toml_str(source)?)
}

fn print_summary(stack: &PillarStack, path: &Path) {
    let template = stack.template();
    let pipeline = stack.pipeline();

    eprintln!("{}", "✓ Template synthesized successfully!".green().bold());
    eprintln!("  Stack:     {}", stack.stack_name().cyan());
    eprintln!("  Output:    {}", path.display());
    eprintln!("  Resources: {}", template.resources().len());
    eprintln!("  Outputs:   {}", template.outputs().len());
    eprintln!(
        "  Pipeline:  {} ({})",
        pipeline.name.bold(),
        pipeline
            .stages
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
            .dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_accepts_empty_file() {
        let config = parse_config("").unwrap();
        assert_eq!(config.name(), "pillar");
    }

    #[test]
    fn test_parse_config_reports_unknown_keys() {
        assert!(parse_config("colour = \"blue\"").is_err());
    }

    #[test]
    fn test_configured_stack_synthesizes() {
        let config = parse_config(
            r#"
            name = "kitchen"

            [pipeline]
            branch = "main"
            "#,
        )
        .unwrap();

        let stack = PillarStack::synthesize(Environment::Dev, &config).unwrap();
        assert_eq!(stack.stack_name(), "kitchen-dev");

        let json = stack.template().to_json_pretty().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["Resources"].as_object().is_some_and(|r| !r.is_empty()));
    }
}
