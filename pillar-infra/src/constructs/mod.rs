//! Constructs - reusable groups of resources
//!
//! Each construct takes an explicit configuration struct whose optional
//! fields document their defaults, adds its resources to a [`Template`] and
//! returns a handle exposing the values other constructs need.
//!
//! [`Template`]: crate::template::Template

pub mod asset_bucket;
pub mod bastion;
pub mod cluster;
pub mod codebuild;
pub mod db_cluster;
pub mod iam;
pub mod security;
pub mod service;
pub mod vpc;
pub mod website;

use serde::Deserialize;

use crate::environment::Environment;
use crate::template::Value;

/// Public DNS zone records are created in
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainConfig {
    /// Zone apex, e.g. `example.com`
    pub zone_name: String,
    pub hosted_zone_id: String,
}

/// Standard tag set carried by every construct's resources
pub fn tags(name: &str, environment: Environment, description: &str) -> Value {
    Value::List(tag_list(name, environment, description))
}

/// Standard tags plus a `Name` tag, shown by the console for EC2 resources
pub fn tags_with_name(
    name: &str,
    environment: Environment,
    description: &str,
    display_name: &str,
) -> Value {
    let mut tags = tag_list(name, environment, description);
    tags.push(tag("Name", display_name));
    Value::List(tags)
}

fn tag_list(name: &str, environment: Environment, description: &str) -> Vec<Value> {
    vec![
        tag("name", name),
        tag("environmentName", environment.as_str()),
        tag("description", description),
    ]
}

fn tag(key: &str, value: &str) -> Value {
    Value::map([("Key", Value::str(key)), ("Value", Value::str(value))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        let json = serde_json::to_value(tags("vpc", Environment::Dev, "VPC for vpc")).unwrap();
        assert_eq!(json[0]["Key"], "name");
        assert_eq!(json[1]["Value"], "dev");
        assert_eq!(json[2]["Value"], "VPC for vpc");
    }

    #[test]
    fn test_tags_with_name() {
        let value = tags_with_name("bastion", Environment::Prod, "d", "bastion-prod");
        assert_eq!(value.as_list().unwrap().len(), 4);
    }
}
