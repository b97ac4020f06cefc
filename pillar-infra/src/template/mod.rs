//! Template - the synthesized resource graph
//!
//! A Template is the declarative output of synthesis. Nothing is created
//! until the provisioning engine consumes it.

mod resource;
mod value;

pub use resource::{DeletionPolicy, Output, Resource};
pub use value::Value;

use std::collections::HashSet;

use heck::ToUpperCamelCase;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{InfraError, Result};

const FORMAT_VERSION: &str = "2010-09-09";

/// Builds a logical id from path segments
///
/// `["users", "password-secret"]` becomes `UsersPasswordSecret`. Anything
/// that is not ASCII alphanumeric is dropped.
pub fn logical_id(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| segment.to_upper_camel_case())
        .collect::<String>()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Ordered collection of resources and outputs
#[derive(Debug, Clone, Default)]
pub struct Template {
    description: Option<String>,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
    ids: HashSet<String>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Adds a resource, returning a `Ref` to it
    pub fn add_resource(&mut self, resource: Resource) -> Result<Value> {
        self.claim(&resource.logical_id)?;
        tracing::trace!(
            "Adding {} ({})",
            resource.logical_id,
            resource.resource_type
        );
        let reference = resource.reference();
        self.resources.push(resource);
        Ok(reference)
    }

    pub fn add_output(&mut self, output: Output) -> Result<()> {
        self.claim(&output.logical_id)?;
        self.outputs.push(output);
        Ok(())
    }

    fn claim(&mut self, logical_id: &str) -> Result<()> {
        if !self.ids.insert(logical_id.to_string()) {
            return Err(InfraError::DuplicateLogicalId(logical_id.to_string()));
        }
        Ok(())
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn output(&self, logical_id: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.logical_id == logical_id)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    pub fn count_of_type(&self, resource_type: &str) -> usize {
        self.resources_of_type(resource_type).count()
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("AWSTemplateFormatVersion", FORMAT_VERSION)?;
        if let Some(description) = &self.description {
            map.serialize_entry("Description", description)?;
        }
        map.serialize_entry("Resources", &Keyed(&self.resources))?;
        if !self.outputs.is_empty() {
            map.serialize_entry("Outputs", &Keyed(&self.outputs))?;
        }
        map.end()
    }
}

trait LogicalId {
    fn key(&self) -> &str;
}

impl LogicalId for Resource {
    fn key(&self) -> &str {
        &self.logical_id
    }
}

impl LogicalId for Output {
    fn key(&self) -> &str {
        &self.logical_id
    }
}

/// Serializes a slice as a map keyed by logical id, keeping slice order
struct Keyed<'a, T>(&'a [T]);

impl<T: Serialize + LogicalId> Serialize for Keyed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for item in self.0 {
            map.serialize_entry(item.key(), item)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id() {
        assert_eq!(logical_id(&["users", "password-secret"]), "UsersPasswordSecret");
        assert_eq!(logical_id(&["recipe_service", "cluster"]), "RecipeServiceCluster");
        assert_eq!(logical_id(&["vpc", "public-subnet-1"]), "VpcPublicSubnet1");
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut template = Template::new();
        template.add_resource(Resource::new("Vpc", "AWS::EC2::VPC")).unwrap();

        let err = template
            .add_resource(Resource::new("Vpc", "AWS::EC2::VPC"))
            .unwrap_err();
        assert!(matches!(err, InfraError::DuplicateLogicalId(id) if id == "Vpc"));

        let err = template
            .add_output(Output::new("Vpc", Value::str("x")))
            .unwrap_err();
        assert!(matches!(err, InfraError::DuplicateLogicalId(_)));
    }

    #[test]
    fn test_renders_template_document() {
        let mut template = Template::new().with_description("test stack");
        let bucket = template
            .add_resource(
                Resource::new("Bucket", "AWS::S3::Bucket")
                    .with_property("BucketName", "assets")
                    .with_deletion_policy(DeletionPolicy::Delete),
            )
            .unwrap();
        template
            .add_output(Output::new("BucketName", bucket).with_export("assets-bucket-name"))
            .unwrap();

        let json = template.to_json().unwrap();
        assert_eq!(json["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(json["Description"], "test stack");
        assert_eq!(json["Resources"]["Bucket"]["Type"], "AWS::S3::Bucket");
        assert_eq!(json["Resources"]["Bucket"]["DeletionPolicy"], "Delete");
        assert_eq!(json["Outputs"]["BucketName"]["Value"]["Ref"], "Bucket");
        assert_eq!(
            json["Outputs"]["BucketName"]["Export"]["Name"],
            "assets-bucket-name"
        );
    }

    #[test]
    fn test_count_of_type() {
        let mut template = Template::new();
        template.add_resource(Resource::new("A", "AWS::EC2::Subnet")).unwrap();
        template.add_resource(Resource::new("B", "AWS::EC2::Subnet")).unwrap();
        template.add_resource(Resource::new("C", "AWS::EC2::VPC")).unwrap();

        assert_eq!(template.count_of_type("AWS::EC2::Subnet"), 2);
        assert_eq!(template.count_of_type("AWS::EC2::VPC"), 1);
        assert!(template.resource("C").is_some());
    }
}
