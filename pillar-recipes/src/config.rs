//! Service configuration
//!
//! Read once at start from environment variables. Every setting has a
//! default suitable for a local PostgreSQL instance.

use std::str::FromStr;

use anyhow::Context;

/// Where recipes are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Postgres,
    /// Process-local store, lost on restart
    Memory,
}

impl FromStr for Storage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(Storage::Postgres),
            "memory" => Ok(Storage::Memory),
            other => anyhow::bail!("unknown storage '{}' (expected postgres or memory)", other),
        }
    }
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
    /// Create the schema at start
    pub sync: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "recipes".to_string(),
            sync: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Application name shown in logs
    pub name: String,
    pub address: String,
    pub port: u16,
    pub storage: Storage,
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "recipes-service".to_string(),
            address: "0.0.0.0".to_string(),
            port: 9000,
            storage: Storage::Postgres,
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognised variables:
    /// - NAME (default: recipes-service)
    /// - ADDRESS (default: 0.0.0.0)
    /// - PORT (default: 9000)
    /// - RECIPES_STORAGE (postgres | memory, default: postgres)
    /// - RECIPES_DB_HOST (default: localhost)
    /// - RECIPES_DB_PORT (default: 5432)
    /// - RECIPES_DB_USERNAME (default: postgres)
    /// - RECIPES_DB_PASSWORD (default: postgres)
    /// - RECIPES_DB_NAME (default: recipes)
    /// - RECIPES_DB_SYNC (default: false)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Config::default();
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = match lookup("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{}'", value))?,
            None => defaults.port,
        };

        let storage = match lookup("RECIPES_STORAGE") {
            Some(value) => value.parse()?,
            None => defaults.storage,
        };

        let db_port = match lookup("RECIPES_DB_PORT") {
            Some(value) => value.parse::<u16>().with_context(|| {
                format!("RECIPES_DB_PORT must be a port number, got '{}'", value)
            })?,
            None => defaults.database.port,
        };

        // Any value other than empty or "false" enables schema sync
        let sync = lookup("RECIPES_DB_SYNC")
            .map(|value| !value.is_empty() && value != "false")
            .unwrap_or(defaults.database.sync);

        Ok(Self {
            name: var("NAME", &defaults.name),
            address: var("ADDRESS", &defaults.address),
            port,
            storage,
            database: DatabaseConfig {
                host: var("RECIPES_DB_HOST", &defaults.database.host),
                port: db_port,
                username: var("RECIPES_DB_USERNAME", &defaults.database.username),
                password: var("RECIPES_DB_PASSWORD", &defaults.database.password),
                name: var("RECIPES_DB_NAME", &defaults.database.name),
                sync,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.address.is_empty() {
            anyhow::bail!("address cannot be empty");
        }

        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.storage == Storage::Postgres {
            if self.database.host.is_empty() {
                anyhow::bail!("database host cannot be empty");
            }

            if self.database.name.is_empty() {
                anyhow::bail!("database name cannot be empty");
            }
        }

        Ok(())
    }
}
