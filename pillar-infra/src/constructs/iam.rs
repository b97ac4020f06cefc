//! IAM service roles

use crate::error::Result;
use crate::template::{Resource, Template, Value};

/// Handle to a role added to the template
#[derive(Debug, Clone)]
pub struct Role {
    pub logical_id: String,
    pub role_name: Option<String>,
}

impl Role {
    pub fn arn(&self) -> Value {
        Value::get_att(&self.logical_id, "Arn")
    }

    pub fn reference(&self) -> Value {
        Value::reference(&self.logical_id)
    }
}

/// ARN of an AWS managed policy in the current partition
pub fn managed_policy_arn(policy_name: &str) -> Value {
    Value::sub(format!("arn:${{AWS::Partition}}:iam::aws:policy/{}", policy_name))
}

/// Builder for a role assumed by an AWS service principal
#[derive(Debug, Clone)]
pub struct RoleBuilder {
    logical_id: String,
    principal: String,
    role_name: Option<String>,
    managed_policies: Vec<Value>,
    statements: Vec<Value>,
}

impl RoleBuilder {
    /// `principal` is the service host, e.g. `codebuild.amazonaws.com`
    pub fn new(logical_id: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            principal: principal.into(),
            role_name: None,
            managed_policies: Vec::new(),
            statements: Vec::new(),
        }
    }

    pub fn named(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }

    pub fn managed_policy(mut self, policy_name: &str) -> Self {
        self.managed_policies.push(managed_policy_arn(policy_name));
        self
    }

    /// Adds an inline `Allow` statement
    pub fn allow(mut self, actions: &[&str], resources: Vec<Value>) -> Self {
        self.statements.push(Value::map([
            ("Effect", Value::str("Allow")),
            ("Action", Value::list(actions.iter().map(|a| Value::str(*a)))),
            ("Resource", Value::List(resources)),
        ]));
        self
    }

    pub fn build(self, template: &mut Template) -> Result<Role> {
        let assume_role = Value::map([
            ("Version", Value::str("2012-10-17")),
            (
                "Statement",
                Value::list([Value::map([
                    ("Effect", Value::str("Allow")),
                    (
                        "Principal",
                        Value::map([("Service", Value::str(&self.principal))]),
                    ),
                    ("Action", Value::str("sts:AssumeRole")),
                ])]),
            ),
        ]);

        let mut resource = Resource::new(&self.logical_id, "AWS::IAM::Role")
            .with_property("AssumeRolePolicyDocument", assume_role)
            .with_optional_property("RoleName", self.role_name.clone());

        if !self.managed_policies.is_empty() {
            resource = resource.with_property("ManagedPolicyArns", Value::List(self.managed_policies));
        }

        if !self.statements.is_empty() {
            resource = resource.with_property(
                "Policies",
                Value::list([Value::map([
                    ("PolicyName", Value::str("inline")),
                    (
                        "PolicyDocument",
                        Value::map([
                            ("Version", Value::str("2012-10-17")),
                            ("Statement", Value::List(self.statements)),
                        ]),
                    ),
                ])]),
            );
        }

        template.add_resource(resource)?;

        Ok(Role {
            logical_id: self.logical_id,
            role_name: self.role_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_with_managed_and_inline_policies() {
        let mut template = Template::new();
        let role = RoleBuilder::new("BuildRole", "codebuild.amazonaws.com")
            .named("web-code-build-role")
            .managed_policy("CloudWatchLogsFullAccess")
            .allow(&["s3:GetObject"], vec![Value::str("*")])
            .build(&mut template)
            .unwrap();

        assert_eq!(role.arn(), Value::get_att("BuildRole", "Arn"));

        let json = template.to_json().unwrap();
        let props = &json["Resources"]["BuildRole"]["Properties"];
        assert_eq!(props["RoleName"], "web-code-build-role");
        assert_eq!(
            props["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "codebuild.amazonaws.com"
        );
        assert_eq!(
            props["ManagedPolicyArns"][0]["Fn::Sub"],
            "arn:${AWS::Partition}:iam::aws:policy/CloudWatchLogsFullAccess"
        );
        assert_eq!(
            props["Policies"][0]["PolicyDocument"]["Statement"][0]["Action"][0],
            "s3:GetObject"
        );
    }

    #[test]
    fn test_role_without_policies_omits_keys() {
        let mut template = Template::new();
        RoleBuilder::new("Plain", "ec2.amazonaws.com")
            .build(&mut template)
            .unwrap();

        let resource = template.resource("Plain").unwrap();
        assert!(resource.property("ManagedPolicyArns").is_none());
        assert!(resource.property("Policies").is_none());
        assert!(resource.property("RoleName").is_none());
    }
}
