//! Configuration module
//!
//! Settings shared by every CLI command.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the recipes service
    pub recipes_url: String,
}
