//! VPC with public, private and isolated subnet groups

use serde::Deserialize;

use crate::cidr::Ipv4Cidr;
use crate::constructs::{tags, tags_with_name};
use crate::environment::Environment;
use crate::error::{InfraError, Result};
use crate::template::{Output, Resource, Template, Value, logical_id};

const DEFAULT_MAX_AZS: usize = 2;
const DEFAULT_CIDR_MASK: u8 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetType {
    /// Routed through the internet gateway
    Public,
    /// Outbound only, through a NAT gateway
    Private,
    /// No route out of the VPC
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubnetGroup {
    pub name: String,
    pub subnet_type: SubnetType,
    pub cidr_mask: u8,
}

impl SubnetGroup {
    pub fn new(name: &str, subnet_type: SubnetType) -> Self {
        Self {
            name: name.to_string(),
            subnet_type,
            cidr_mask: DEFAULT_CIDR_MASK,
        }
    }
}

/// VPC options; every field falls back to a documented default
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VpcConfig {
    /// Address range. Default: the environment's range
    pub cidr: Option<String>,
    /// Availability zones to spread each subnet group over. Default: 2
    pub max_azs: Option<usize>,
    /// NAT gateways serving private subnets. Default: one per AZ
    pub nat_gateways: Option<usize>,
    /// Subnet groups, carved in order. Default: Public, Private, Isolated
    /// and a private Reserved group, all /21
    pub subnet_groups: Option<Vec<SubnetGroup>>,
    /// Gateway endpoint services. Default: s3 and dynamodb
    pub gateway_endpoints: Option<Vec<String>>,
}

impl VpcConfig {
    pub fn cidr(&self, environment: Environment) -> &str {
        self.cidr.as_deref().unwrap_or(environment.default_cidr())
    }

    pub fn max_azs(&self) -> usize {
        self.max_azs.unwrap_or(DEFAULT_MAX_AZS)
    }

    pub fn nat_gateways(&self) -> usize {
        self.nat_gateways.unwrap_or_else(|| self.max_azs())
    }

    pub fn subnet_groups(&self) -> Vec<SubnetGroup> {
        self.subnet_groups.clone().unwrap_or_else(|| {
            vec![
                SubnetGroup::new("Public", SubnetType::Public),
                SubnetGroup::new("Private", SubnetType::Private),
                SubnetGroup::new("Isolated", SubnetType::Isolated),
                SubnetGroup::new("Reserved", SubnetType::Private),
            ]
        })
    }

    pub fn gateway_endpoints(&self) -> Vec<String> {
        self.gateway_endpoints
            .clone()
            .unwrap_or_else(|| vec!["s3".to_string(), "dynamodb".to_string()])
    }
}

#[derive(Debug, Clone)]
pub struct Subnet {
    pub logical_id: String,
    pub group: String,
    pub subnet_type: SubnetType,
    pub az_index: usize,
    pub cidr: Ipv4Cidr,
    pub route_table: String,
}

impl Subnet {
    pub fn subnet_id(&self) -> Value {
        Value::reference(&self.logical_id)
    }
}

/// Handle to the synthesized network
#[derive(Debug, Clone)]
pub struct PillarVpc {
    pub logical_id: String,
    pub cidr: Ipv4Cidr,
    pub subnets: Vec<Subnet>,
}

impl PillarVpc {
    pub fn build(
        template: &mut Template,
        name: &str,
        environment: Environment,
        config: &VpcConfig,
    ) -> Result<Self> {
        let cidr: Ipv4Cidr = config.cidr(environment).parse()?;
        let max_azs = config.max_azs();
        let groups = config.subnet_groups();
        validate(config, &groups)?;

        let description = format!("VPC for {} running in {}", name, environment);
        let display_name = format!("{}-{}", name, environment);
        let vpc_id = logical_id(&[name]);

        tracing::debug!("Building VPC {} ({}) across {} AZs", vpc_id, cidr, max_azs);

        template.add_resource(
            Resource::new(&vpc_id, "AWS::EC2::VPC")
                .with_property("CidrBlock", cidr.to_string())
                .with_property("EnableDnsHostnames", true)
                .with_property("EnableDnsSupport", true)
                .with_property("InstanceTenancy", "default")
                .with_property(
                    "Tags",
                    tags_with_name(name, environment, &description, &display_name),
                ),
        )?;

        let igw_id = logical_id(&[name, "igw"]);
        let attachment_id = logical_id(&[name, "vpcgw"]);
        let has_public = groups.iter().any(|g| g.subnet_type == SubnetType::Public);
        if has_public {
            template.add_resource(
                Resource::new(&igw_id, "AWS::EC2::InternetGateway")
                    .with_property("Tags", tags(name, environment, &description)),
            )?;
            template.add_resource(
                Resource::new(&attachment_id, "AWS::EC2::VPCGatewayAttachment")
                    .with_property("VpcId", Value::reference(&vpc_id))
                    .with_property("InternetGatewayId", Value::reference(&igw_id)),
            )?;
        }

        let mut allocator = cidr.allocator();
        let mut subnets = Vec::new();
        for group in &groups {
            for az in 0..max_azs {
                let block = allocator.allocate(group.cidr_mask)?;
                let az_label = (az + 1).to_string();
                let subnet_id = logical_id(&[name, &group.name, "subnet", &az_label]);
                let route_table = format!("{}RouteTable", subnet_id);

                template.add_resource(
                    Resource::new(&subnet_id, "AWS::EC2::Subnet")
                        .with_property("VpcId", Value::reference(&vpc_id))
                        .with_property("CidrBlock", block.to_string())
                        .with_property("AvailabilityZone", Value::availability_zone(az))
                        .with_property(
                            "MapPublicIpOnLaunch",
                            group.subnet_type == SubnetType::Public,
                        )
                        .with_property(
                            "Tags",
                            tags_with_name(
                                name,
                                environment,
                                &description,
                                &format!("{}/{}{}", display_name, group.name, az_label),
                            ),
                        ),
                )?;
                template.add_resource(
                    Resource::new(&route_table, "AWS::EC2::RouteTable")
                        .with_property("VpcId", Value::reference(&vpc_id))
                        .with_property("Tags", tags(name, environment, &description)),
                )?;
                template.add_resource(
                    Resource::new(
                        format!("{}RouteTableAssociation", subnet_id),
                        "AWS::EC2::SubnetRouteTableAssociation",
                    )
                    .with_property("RouteTableId", Value::reference(&route_table))
                    .with_property("SubnetId", Value::reference(&subnet_id)),
                )?;

                subnets.push(Subnet {
                    logical_id: subnet_id,
                    group: group.name.clone(),
                    subnet_type: group.subnet_type,
                    az_index: az,
                    cidr: block,
                    route_table,
                });
            }
        }

        let vpc = PillarVpc {
            logical_id: vpc_id,
            cidr,
            subnets,
        };

        vpc.build_public_routes(template, &igw_id, &attachment_id)?;
        vpc.build_nat_routes(template, name, environment, config.nat_gateways(), &description)?;
        vpc.build_gateway_endpoints(template, name, &config.gateway_endpoints())?;
        vpc.export_subnet_ids(template, environment)?;

        Ok(vpc)
    }

    fn build_public_routes(
        &self,
        template: &mut Template,
        igw_id: &str,
        attachment_id: &str,
    ) -> Result<()> {
        for subnet in self.subnets_of(SubnetType::Public) {
            template.add_resource(
                Resource::new(format!("{}DefaultRoute", subnet.logical_id), "AWS::EC2::Route")
                    .with_property("RouteTableId", Value::reference(&subnet.route_table))
                    .with_property("DestinationCidrBlock", "0.0.0.0/0")
                    .with_property("GatewayId", Value::reference(igw_id))
                    .depends_on(attachment_id),
            )?;
        }
        Ok(())
    }

    /// One NAT gateway per AZ (up to `count`), private subnets route to the
    /// gateway of their own AZ or wrap around when there are fewer gateways
    fn build_nat_routes(
        &self,
        template: &mut Template,
        name: &str,
        environment: Environment,
        count: usize,
        description: &str,
    ) -> Result<()> {
        let private: Vec<&Subnet> = self.subnets_of(SubnetType::Private).collect();
        if private.is_empty() {
            return Ok(());
        }

        let public: Vec<&Subnet> = self.subnets_of(SubnetType::Public).collect();
        let mut gateways = Vec::new();
        for host in public.iter().take(count) {
            let eip = format!("{}Eip", host.logical_id);
            let nat = format!("{}NatGateway", host.logical_id);
            template.add_resource(
                Resource::new(&eip, "AWS::EC2::EIP")
                    .with_property("Domain", "vpc")
                    .with_property("Tags", tags(name, environment, description)),
            )?;
            template.add_resource(
                Resource::new(&nat, "AWS::EC2::NatGateway")
                    .with_property("SubnetId", host.subnet_id())
                    .with_property("AllocationId", Value::get_att(&eip, "AllocationId"))
                    .with_property("Tags", tags(name, environment, description)),
            )?;
            gateways.push(nat);
        }

        for subnet in private {
            let nat = &gateways[subnet.az_index % gateways.len()];
            template.add_resource(
                Resource::new(format!("{}DefaultRoute", subnet.logical_id), "AWS::EC2::Route")
                    .with_property("RouteTableId", Value::reference(&subnet.route_table))
                    .with_property("DestinationCidrBlock", "0.0.0.0/0")
                    .with_property("NatGatewayId", Value::reference(nat)),
            )?;
        }
        Ok(())
    }

    fn build_gateway_endpoints(
        &self,
        template: &mut Template,
        name: &str,
        services: &[String],
    ) -> Result<()> {
        let route_tables: Vec<Value> = self
            .subnets
            .iter()
            .filter(|s| s.subnet_type != SubnetType::Public)
            .map(|s| Value::reference(&s.route_table))
            .collect();

        for service in services {
            template.add_resource(
                Resource::new(logical_id(&[name, service, "endpoint"]), "AWS::EC2::VPCEndpoint")
                    .with_property("VpcId", self.vpc_id())
                    .with_property("VpcEndpointType", "Gateway")
                    .with_property(
                        "ServiceName",
                        Value::sub(format!("com.amazonaws.${{AWS::Region}}.{}", service)),
                    )
                    .with_property("RouteTableIds", Value::List(route_tables.clone())),
            )?;
        }
        Ok(())
    }

    fn export_subnet_ids(&self, template: &mut Template, environment: Environment) -> Result<()> {
        for (label, subnet_type) in [
            ("isolated", SubnetType::Isolated),
            ("private", SubnetType::Private),
            ("public", SubnetType::Public),
        ] {
            let ids = self.subnet_ids(subnet_type);
            if ids.is_empty() {
                continue;
            }
            let output_name = format!("{}-vpc-{}-subnet-ids", environment, label);
            template.add_output(
                Output::new(logical_id(&[&output_name]), Value::join(",", ids))
                    .with_description(format!("{} subnet ids for the {} VPC", label, environment)),
            )?;
        }
        Ok(())
    }

    pub fn vpc_id(&self) -> Value {
        Value::reference(&self.logical_id)
    }

    pub fn subnets_of(&self, subnet_type: SubnetType) -> impl Iterator<Item = &Subnet> {
        self.subnets
            .iter()
            .filter(move |s| s.subnet_type == subnet_type)
    }

    pub fn subnet_ids(&self, subnet_type: SubnetType) -> Vec<Value> {
        self.subnets_of(subnet_type).map(Subnet::subnet_id).collect()
    }

    pub fn public_subnet_ids(&self) -> Vec<Value> {
        self.subnet_ids(SubnetType::Public)
    }

    pub fn private_subnet_ids(&self) -> Vec<Value> {
        self.subnet_ids(SubnetType::Private)
    }

    pub fn isolated_subnet_ids(&self) -> Vec<Value> {
        self.subnet_ids(SubnetType::Isolated)
    }
}

fn validate(config: &VpcConfig, groups: &[SubnetGroup]) -> Result<()> {
    if config.max_azs() == 0 {
        return Err(InfraError::invalid_config("max_azs must be at least 1"));
    }
    let has = |t: SubnetType| groups.iter().any(|g| g.subnet_type == t);
    if has(SubnetType::Private) {
        if !has(SubnetType::Public) {
            return Err(InfraError::invalid_config(
                "private subnets need a public subnet group to host NAT gateways",
            ));
        }
        if config.nat_gateways() == 0 || config.nat_gateways() > config.max_azs() {
            return Err(InfraError::invalid_config(format!(
                "nat_gateways must be between 1 and {}",
                config.max_azs()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(config: &VpcConfig) -> (Template, PillarVpc) {
        let mut template = Template::new();
        let vpc = PillarVpc::build(&mut template, "vpc", Environment::Dev, config).unwrap();
        (template, vpc)
    }

    #[test]
    fn test_default_layout() {
        let (template, vpc) = build(&VpcConfig::default());

        assert_eq!(vpc.cidr.to_string(), "10.110.0.0/16");
        assert_eq!(template.count_of_type("AWS::EC2::VPC"), 1);
        assert_eq!(template.count_of_type("AWS::EC2::Subnet"), 8);
        assert_eq!(template.count_of_type("AWS::EC2::NatGateway"), 2);
        assert_eq!(template.count_of_type("AWS::EC2::VPCEndpoint"), 2);
        assert_eq!(vpc.public_subnet_ids().len(), 2);
        // Private and Reserved groups are both private
        assert_eq!(vpc.private_subnet_ids().len(), 4);
        assert_eq!(vpc.isolated_subnet_ids().len(), 2);
    }

    #[test]
    fn test_subnets_are_carved_in_group_order() {
        let (_, vpc) = build(&VpcConfig::default());
        let blocks: Vec<String> = vpc.subnets.iter().map(|s| s.cidr.to_string()).collect();

        assert_eq!(blocks[0], "10.110.0.0/21");
        assert_eq!(blocks[1], "10.110.8.0/21");
        assert_eq!(blocks[2], "10.110.16.0/21");
        assert_eq!(vpc.subnets[2].group, "Private");
        assert_eq!(vpc.subnets[4].logical_id, "VpcIsolatedSubnet1");
    }

    #[test]
    fn test_private_routes_use_nat_of_same_az() {
        let (template, _) = build(&VpcConfig::default());
        let route = template.resource("VpcPrivateSubnet2DefaultRoute").unwrap();
        assert_eq!(
            route.property("NatGatewayId"),
            Some(&Value::reference("VpcPublicSubnet2NatGateway"))
        );
        assert!(template.resource("VpcIsolatedSubnet1DefaultRoute").is_none());
    }

    #[test]
    fn test_single_nat_gateway_is_shared() {
        let config = VpcConfig {
            nat_gateways: Some(1),
            ..Default::default()
        };
        let (template, _) = build(&config);
        let route = template.resource("VpcPrivateSubnet2DefaultRoute").unwrap();

        assert_eq!(template.count_of_type("AWS::EC2::NatGateway"), 1);
        assert_eq!(
            route.property("NatGatewayId"),
            Some(&Value::reference("VpcPublicSubnet1NatGateway"))
        );
    }

    #[test]
    fn test_exports_subnet_ids() {
        let (template, _) = build(&VpcConfig::default());
        assert!(template.output("DevVpcIsolatedSubnetIds").is_some());
        assert!(template.output("DevVpcPublicSubnetIds").is_some());
    }

    #[test]
    fn test_rejects_private_without_public() {
        let config = VpcConfig {
            subnet_groups: Some(vec![SubnetGroup::new("App", SubnetType::Private)]),
            ..Default::default()
        };
        let mut template = Template::new();
        let err = PillarVpc::build(&mut template, "vpc", Environment::Dev, &config).unwrap_err();
        assert!(matches!(err, InfraError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_oversized_layout() {
        let config = VpcConfig {
            cidr: Some("10.0.0.0/20".to_string()),
            ..Default::default()
        };
        let mut template = Template::new();
        let err = PillarVpc::build(&mut template, "vpc", Environment::Dev, &config).unwrap_err();
        assert!(matches!(err, InfraError::AddressSpaceExhausted { .. }));
    }
}
