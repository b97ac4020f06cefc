//! Bastion host for reaching private resources over SSH or Session Manager

use serde::Deserialize;

use crate::constructs::security::{Connectable, SecurityGroup, SecurityGroupBuilder};
use crate::constructs::vpc::{PillarVpc, SubnetType};
use crate::constructs::{iam::RoleBuilder, tags, tags_with_name};
use crate::environment::Environment;
use crate::error::{InfraError, Result};
use crate::template::{Output, Resource, Template, Value, logical_id};

const DEFAULT_INSTANCE_TYPE: &str = "t3.micro";
const AMAZON_LINUX_2_AMI: &str =
    "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2}}";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BastionConfig {
    /// Default: "bastion"
    pub name: Option<String>,
    /// Default: t3.micro
    pub instance_type: Option<String>,
    /// Range allowed to open SSH sessions. Default: 0.0.0.0/0
    pub ssh_cidr: Option<String>,
}

impl BastionConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("bastion")
    }

    pub fn instance_type(&self) -> &str {
        self.instance_type.as_deref().unwrap_or(DEFAULT_INSTANCE_TYPE)
    }

    pub fn ssh_cidr(&self) -> &str {
        self.ssh_cidr.as_deref().unwrap_or("0.0.0.0/0")
    }
}

#[derive(Debug, Clone)]
pub struct BastionHost {
    pub logical_id: String,
    pub security_group: SecurityGroup,
}

impl BastionHost {
    pub fn build(
        template: &mut Template,
        vpc: &PillarVpc,
        environment: Environment,
        config: &BastionConfig,
    ) -> Result<Self> {
        let name = config.name();
        let description = format!("Bastion host for {}", environment);
        let subnet = vpc
            .subnets_of(SubnetType::Public)
            .next()
            .ok_or_else(|| InfraError::invalid_config("bastion host needs a public subnet"))?;

        let security_group = SecurityGroupBuilder::new(
            logical_id(&[name, "security-group"]),
            format!("SSH access to the {} bastion host", environment),
            vpc.vpc_id(),
        )
        .allow_cidr(config.ssh_cidr(), 22, "SSH access")
        .tags(tags(name, environment, &description))
        .build(template)?;

        let role = RoleBuilder::new(logical_id(&[name, "role"]), "ec2.amazonaws.com")
            .managed_policy("AmazonSSMManagedInstanceCore")
            .build(template)?;

        let profile_id = logical_id(&[name, "instance-profile"]);
        template.add_resource(
            Resource::new(&profile_id, "AWS::IAM::InstanceProfile")
                .with_property("Roles", Value::list([role.reference()])),
        )?;

        let instance_id = logical_id(&[name, "instance"]);
        template.add_resource(
            Resource::new(&instance_id, "AWS::EC2::Instance")
                .with_property("InstanceType", config.instance_type())
                .with_property("ImageId", AMAZON_LINUX_2_AMI)
                .with_property("IamInstanceProfile", Value::reference(&profile_id))
                .with_property("SubnetId", subnet.subnet_id())
                .with_property("SecurityGroupIds", Value::list([security_group.group_id()]))
                .with_property(
                    "Tags",
                    tags_with_name(
                        name,
                        environment,
                        &description,
                        &environment.qualify(name),
                    ),
                ),
        )?;

        template.add_output(
            Output::new(
                logical_id(&[name, "instance-id"]),
                Value::reference(&instance_id),
            )
            .with_description("Bastion host instance id"),
        )?;

        tracing::debug!("Built bastion host {} in {}", instance_id, subnet.logical_id);

        Ok(Self {
            logical_id: instance_id,
            security_group,
        })
    }
}

impl Connectable for BastionHost {
    fn security_group_id(&self) -> Value {
        self.security_group.group_id()
    }

    fn connection_id(&self) -> &str {
        &self.security_group.logical_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructs::vpc::VpcConfig;

    #[test]
    fn test_bastion_in_first_public_subnet() {
        let mut template = Template::new();
        let vpc =
            PillarVpc::build(&mut template, "vpc", Environment::Demo, &VpcConfig::default())
                .unwrap();
        let bastion =
            BastionHost::build(&mut template, &vpc, Environment::Demo, &BastionConfig::default())
                .unwrap();

        let instance = template.resource(&bastion.logical_id).unwrap();
        assert_eq!(instance.property("InstanceType"), Some(&Value::str("t3.micro")));
        assert_eq!(
            instance.property("SubnetId"),
            Some(&Value::reference("VpcPublicSubnet1"))
        );
        assert!(template.output("BastionInstanceId").is_some());

        let json = template.to_json().unwrap();
        let rule = &json["Resources"]["BastionSecurityGroup"]["Properties"]["SecurityGroupIngress"][0];
        assert_eq!(rule["CidrIp"], "0.0.0.0/0");
        assert_eq!(rule["FromPort"], 22);
        assert_eq!(
            json["Resources"]["BastionRole"]["Properties"]["ManagedPolicyArns"][0]["Fn::Sub"],
            "arn:${AWS::Partition}:iam::aws:policy/AmazonSSMManagedInstanceCore"
        );
    }

    #[test]
    fn test_bastion_requires_public_subnet() {
        let mut template = Template::new();
        let config = VpcConfig {
            subnet_groups: Some(vec![]),
            ..Default::default()
        };
        let vpc = PillarVpc::build(&mut template, "vpc", Environment::Demo, &config).unwrap();

        let err = BastionHost::build(&mut template, &vpc, Environment::Demo, &BastionConfig::default())
            .unwrap_err();
        assert!(matches!(err, InfraError::InvalidConfig(_)));
    }
}
