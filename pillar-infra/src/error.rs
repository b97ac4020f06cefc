//! Error types for stack synthesis

use thiserror::Error;

/// Result type alias for synthesis operations
pub type Result<T> = std::result::Result<T, InfraError>;

/// Errors raised while building a stack
///
/// Every variant is a configuration problem detected before anything is
/// submitted to the provisioning engine; synthesis stops at the first one.
#[derive(Debug, Error)]
pub enum InfraError {
    /// Database cluster configured below its minimum capacity
    #[error("Minimum scaling capacity for {name} is {minimum}")]
    MinimumCapacity { name: String, minimum: u32 },

    /// Maximum capacity lower than minimum capacity
    #[error("Maximum capacity for {name} ({max}) is lower than its minimum capacity ({min})")]
    CapacityRange { name: String, min: u32, max: u32 },

    /// Two resources share a logical id
    #[error("Duplicate logical id in template: {0}")]
    DuplicateLogicalId(String),

    /// Environment name not recognised
    #[error("Unknown environment '{0}' (expected one of demo, dev, prod, prototype)")]
    UnknownEnvironment(String),

    /// Malformed or misaligned CIDR block
    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    /// Not enough room left in the VPC range
    #[error("Address space {cidr} has no room left for another /{prefix} subnet")]
    AddressSpaceExhausted { cidr: String, prefix: u8 },

    /// Two different actions registered under the same name
    #[error("Pipeline action '{0}' is registered twice with different definitions")]
    DuplicateAction(String),

    /// A pipeline stage would be created without actions
    #[error("Pipeline stage '{0}' has no actions")]
    EmptyStage(String),

    /// Any other invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Template could not be rendered
    #[error("Failed to serialize template: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stack configuration file could not be parsed
    #[error("Failed to parse stack configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl InfraError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
