//! Resources and outputs

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::value::Value;

/// What happens to a resource when it leaves the template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
            DeletionPolicy::Snapshot => "Snapshot",
        }
    }
}

/// A declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub logical_id: String,
    /// Provider type (e.g., "AWS::EC2::VPC")
    pub resource_type: String,
    pub properties: BTreeMap<String, Value>,
    pub depends_on: Vec<String>,
    pub deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
            deletion_policy: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets a property only when a value is present
    pub fn with_optional_property(
        self,
        key: impl Into<String>,
        value: Option<impl Into<Value>>,
    ) -> Self {
        match value {
            Some(value) => self.with_property(key, value),
            None => self,
        }
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// `Ref` to this resource
    pub fn reference(&self) -> Value {
        Value::reference(&self.logical_id)
    }

    pub fn attribute(&self, name: &str) -> Value {
        Value::get_att(&self.logical_id, name)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Type", &self.resource_type)?;
        if !self.properties.is_empty() {
            map.serialize_entry("Properties", &self.properties)?;
        }
        if !self.depends_on.is_empty() {
            map.serialize_entry("DependsOn", &self.depends_on)?;
        }
        if let Some(policy) = self.deletion_policy {
            map.serialize_entry("DeletionPolicy", policy.as_str())?;
            map.serialize_entry("UpdateReplacePolicy", policy.as_str())?;
        }
        map.end()
    }
}

/// A value published by the stack, optionally exported for other stacks
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub logical_id: String,
    pub description: Option<String>,
    pub value: Value,
    pub export_name: Option<String>,
}

impl Output {
    pub fn new(logical_id: impl Into<String>, value: Value) -> Self {
        Self {
            logical_id: logical_id.into(),
            description: None,
            value,
            export_name: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_export(mut self, export_name: impl Into<String>) -> Self {
        self.export_name = Some(export_name.into());
        self
    }
}

impl Serialize for Output {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(description) = &self.description {
            map.serialize_entry("Description", description)?;
        }
        map.serialize_entry("Value", &self.value)?;
        if let Some(export_name) = &self.export_name {
            map.serialize_entry("Export", &Value::map([("Name", Value::str(export_name))]))?;
        }
        map.end()
    }
}
