//! Deployment environments

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InfraError;

/// A named deployment target with its own resource set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Demo,
    Dev,
    Prod,
    Prototype,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Demo,
        Environment::Dev,
        Environment::Prod,
        Environment::Prototype,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Demo => "demo",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
            Environment::Prototype => "prototype",
        }
    }

    /// Default VPC range; environments never overlap so they can be peered
    pub fn default_cidr(&self) -> &'static str {
        match self {
            Environment::Demo => "10.100.0.0/16",
            Environment::Dev => "10.110.0.0/16",
            Environment::Prod => "10.120.0.0/16",
            Environment::Prototype => "10.130.0.0/16",
        }
    }

    /// Public host label for a unit: bare in prod, suffixed elsewhere
    ///
    /// `website` becomes `website` in prod and `website-dev` in dev.
    pub fn qualify(&self, name: &str) -> String {
        match self {
            Environment::Prod => name.to_string(),
            other => format!("{}-{}", name, other.as_str()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = InfraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" => Ok(Environment::Demo),
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            "prototype" => Ok(Environment::Prototype),
            _ => Err(InfraError::UnknownEnvironment(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        for env in Environment::ALL {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
    }

    #[test]
    fn test_unknown_environment() {
        let err = "staging".parse::<Environment>().unwrap_err();
        assert!(matches!(err, InfraError::UnknownEnvironment(name) if name == "staging"));
    }

    #[test]
    fn test_qualify() {
        assert_eq!(Environment::Prod.qualify("website"), "website");
        assert_eq!(Environment::Dev.qualify("website"), "website-dev");
    }
}
