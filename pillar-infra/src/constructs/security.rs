//! Security groups and network permissions between constructs

use crate::error::Result;
use crate::template::{Resource, Template, Value};

/// Anything that owns a security group and can be granted network access
pub trait Connectable {
    /// Id of the security group traffic originates from
    fn security_group_id(&self) -> Value;

    /// Stable identifier used to name the rules granting access to this peer
    fn connection_id(&self) -> &str;
}

/// Handle to a security group in the template
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    pub logical_id: String,
}

impl SecurityGroup {
    pub fn group_id(&self) -> Value {
        Value::get_att(&self.logical_id, "GroupId")
    }

    /// Opens `port` (TCP) to traffic coming from `peer`
    ///
    /// The rule is a standalone ingress resource so both groups can be
    /// created before either references the other.
    pub fn allow_from(
        &self,
        template: &mut Template,
        peer: &dyn Connectable,
        port: u16,
        description: &str,
    ) -> Result<()> {
        let logical_id = format!("{}From{}Port{}", self.logical_id, peer.connection_id(), port);

        tracing::debug!(
            "Allowing {} -> {} on port {}",
            peer.connection_id(),
            self.logical_id,
            port
        );

        template.add_resource(
            Resource::new(logical_id, "AWS::EC2::SecurityGroupIngress")
                .with_property("GroupId", self.group_id())
                .with_property("SourceSecurityGroupId", peer.security_group_id())
                .with_property("IpProtocol", "tcp")
                .with_property("FromPort", port)
                .with_property("ToPort", port)
                .with_property("Description", description),
        )?;

        Ok(())
    }
}

impl Connectable for SecurityGroup {
    fn security_group_id(&self) -> Value {
        self.group_id()
    }

    fn connection_id(&self) -> &str {
        &self.logical_id
    }
}

#[derive(Debug, Clone)]
pub struct SecurityGroupBuilder {
    logical_id: String,
    description: String,
    vpc_id: Value,
    group_name: Option<String>,
    cidr_rules: Vec<Value>,
    tags: Option<Value>,
}

impl SecurityGroupBuilder {
    pub fn new(logical_id: impl Into<String>, description: impl Into<String>, vpc_id: Value) -> Self {
        Self {
            logical_id: logical_id.into(),
            description: description.into(),
            vpc_id,
            group_name: None,
            cidr_rules: Vec::new(),
            tags: None,
        }
    }

    pub fn named(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    /// Opens a TCP port to an address range
    pub fn allow_cidr(mut self, cidr: &str, port: u16, description: &str) -> Self {
        self.cidr_rules.push(Value::map([
            ("CidrIp", Value::str(cidr)),
            ("IpProtocol", Value::str("tcp")),
            ("FromPort", Value::from(port)),
            ("ToPort", Value::from(port)),
            ("Description", Value::str(description)),
        ]));
        self
    }

    pub fn tags(mut self, tags: Value) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn build(self, template: &mut Template) -> Result<SecurityGroup> {
        let mut resource = Resource::new(&self.logical_id, "AWS::EC2::SecurityGroup")
            .with_property("GroupDescription", self.description.as_str())
            .with_property("VpcId", self.vpc_id)
            .with_optional_property("GroupName", self.group_name)
            .with_optional_property("Tags", self.tags);

        if !self.cidr_rules.is_empty() {
            resource = resource.with_property("SecurityGroupIngress", Value::List(self.cidr_rules));
        }

        template.add_resource(resource)?;

        Ok(SecurityGroup {
            logical_id: self.logical_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_from_adds_ingress_rule() {
        let mut template = Template::new();
        let vpc = Value::reference("Vpc");
        let db = SecurityGroupBuilder::new("DbSg", "database", vpc.clone())
            .build(&mut template)
            .unwrap();
        let app = SecurityGroupBuilder::new("AppSg", "application", vpc)
            .build(&mut template)
            .unwrap();

        db.allow_from(&mut template, &app, 5432, "app to db").unwrap();

        let rule = template.resource("DbSgFromAppSgPort5432").unwrap();
        assert_eq!(rule.resource_type, "AWS::EC2::SecurityGroupIngress");
        assert_eq!(rule.property("GroupId"), Some(&Value::get_att("DbSg", "GroupId")));
        assert_eq!(
            rule.property("SourceSecurityGroupId"),
            Some(&Value::get_att("AppSg", "GroupId"))
        );
        assert_eq!(rule.property("FromPort"), Some(&Value::Int(5432)));
    }

    #[test]
    fn test_granting_twice_is_rejected() {
        let mut template = Template::new();
        let vpc = Value::reference("Vpc");
        let db = SecurityGroupBuilder::new("DbSg", "database", vpc.clone())
            .build(&mut template)
            .unwrap();
        let app = SecurityGroupBuilder::new("AppSg", "application", vpc)
            .build(&mut template)
            .unwrap();

        db.allow_from(&mut template, &app, 5432, "first").unwrap();
        assert!(db.allow_from(&mut template, &app, 5432, "second").is_err());
    }

    #[test]
    fn test_cidr_rules_are_inline() {
        let mut template = Template::new();
        SecurityGroupBuilder::new("BastionSg", "bastion", Value::reference("Vpc"))
            .allow_cidr("0.0.0.0/0", 22, "SSH access")
            .build(&mut template)
            .unwrap();

        let json = template.to_json().unwrap();
        let rule = &json["Resources"]["BastionSg"]["Properties"]["SecurityGroupIngress"][0];
        assert_eq!(rule["CidrIp"], "0.0.0.0/0");
        assert_eq!(rule["FromPort"], 22);
    }
}
