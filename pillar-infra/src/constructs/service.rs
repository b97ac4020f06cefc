//! Load-balanced container service with auto scaling and its build pipeline

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::buildspec::{self, IMAGE_REPO_URI_VAR};
use crate::constructs::cluster::ComputeCluster;
use crate::constructs::codebuild::ProjectBuilder;
use crate::constructs::iam::{Role, RoleBuilder};
use crate::constructs::security::{Connectable, SecurityGroup, SecurityGroupBuilder};
use crate::constructs::vpc::PillarVpc;
use crate::constructs::{DomainConfig, tags};
use crate::environment::Environment;
use crate::error::{InfraError, Result};
use crate::pipeline::{Action, ActionArtifacts, Pipelineable};
use crate::template::{DeletionPolicy, Output, Resource, Template, Value, logical_id};

const DEFAULT_CPU: u32 = 512;
const DEFAULT_MEMORY: u32 = 1024;
const DEFAULT_CONTAINER_PORT: u16 = 3000;
const DEFAULT_DESIRED_COUNT: u32 = 1;
const DEFAULT_MIN_CAPACITY: u32 = 1;
const DEFAULT_MAX_CAPACITY: u32 = 4;
const DEFAULT_TARGET_UTILIZATION: u32 = 50;
const DEFAULT_ROUTE_PATH: &str = "/health";
const LISTENER_PORT: u16 = 80;
const LOG_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Default: "service"
    pub name: Option<String>,
    /// Directory holding the Dockerfile. Default: "services/<name>"
    pub source_path: Option<String>,
    /// Image the service starts from before the first pipeline run.
    /// Default: the service repository's `latest` tag
    pub image: Option<String>,
    /// Task CPU units. Default: 512
    pub cpu: Option<u32>,
    /// Task memory in MiB. Default: 1024
    pub memory: Option<u32>,
    /// Default: 3000
    pub container_port: Option<u16>,
    /// Default: 1
    pub desired_count: Option<u32>,
    /// Default: 1
    pub min_capacity: Option<u32>,
    /// Default: 4
    pub max_capacity: Option<u32>,
    /// Target CPU utilization in percent. Default: 50
    pub cpu_target: Option<u32>,
    /// Target memory utilization in percent. Default: 50
    pub memory_target: Option<u32>,
    /// Health check path. Default: "/health"
    pub route_path: Option<String>,
    /// Extra plain environment variables for the container
    pub environment: BTreeMap<String, String>,
}

impl ServiceConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("service")
    }

    pub fn source_path(&self) -> String {
        self.source_path
            .clone()
            .unwrap_or_else(|| format!("services/{}", self.name()))
    }

    pub fn cpu(&self) -> u32 {
        self.cpu.unwrap_or(DEFAULT_CPU)
    }

    pub fn memory(&self) -> u32 {
        self.memory.unwrap_or(DEFAULT_MEMORY)
    }

    pub fn container_port(&self) -> u16 {
        self.container_port.unwrap_or(DEFAULT_CONTAINER_PORT)
    }

    pub fn desired_count(&self) -> u32 {
        self.desired_count.unwrap_or(DEFAULT_DESIRED_COUNT)
    }

    pub fn min_capacity(&self) -> u32 {
        self.min_capacity.unwrap_or(DEFAULT_MIN_CAPACITY)
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY)
    }

    pub fn cpu_target(&self) -> u32 {
        self.cpu_target.unwrap_or(DEFAULT_TARGET_UTILIZATION)
    }

    pub fn memory_target(&self) -> u32 {
        self.memory_target.unwrap_or(DEFAULT_TARGET_UTILIZATION)
    }

    pub fn route_path(&self) -> &str {
        self.route_path.as_deref().unwrap_or(DEFAULT_ROUTE_PATH)
    }

    /// Public host of the service: `<name>.<zone>` in prod and
    /// `<name>-<env>.<zone>` elsewhere
    pub fn domain_name(&self, environment: Environment, domain: &DomainConfig) -> String {
        format!("{}.{}", environment.qualify(self.name()), domain.zone_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_capacity() < 1 {
            return Err(InfraError::MinimumCapacity {
                name: self.name().to_string(),
                minimum: 1,
            });
        }
        if self.max_capacity() < self.min_capacity() {
            return Err(InfraError::CapacityRange {
                name: self.name().to_string(),
                min: self.min_capacity(),
                max: self.max_capacity(),
            });
        }
        for (label, target) in [("cpu_target", self.cpu_target()), ("memory_target", self.memory_target())] {
            if target == 0 || target > 100 {
                return Err(InfraError::invalid_config(format!(
                    "{} for {} must be between 1 and 100",
                    label,
                    self.name()
                )));
            }
        }
        Ok(())
    }
}

/// Wiring that only exists once other constructs are built
pub struct ServiceProps<'a> {
    pub vpc: &'a PillarVpc,
    pub cluster: &'a ComputeCluster,
    pub domain: Option<&'a DomainConfig>,
    /// Plain container environment
    pub environment: Vec<(String, Value)>,
    /// Container environment resolved from secret ARNs at task start
    pub secrets: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    pub service_logical_id: String,
    pub repository_logical_id: String,
    pub security_group: SecurityGroup,
    pub build_project_name: String,
    pub build_role: Role,
    cluster: Value,
}

impl Service {
    pub fn build(
        template: &mut Template,
        environment: Environment,
        config: &ServiceConfig,
        props: ServiceProps<'_>,
    ) -> Result<Self> {
        config.validate()?;

        let name = config.name();
        let qualified = environment.qualify(name);
        let description = format!("ECS service for {} running in {}", name, environment);
        let tags = tags(name, environment, &description);
        let port = config.container_port();

        let task_subnets = props.vpc.private_subnet_ids();
        if task_subnets.is_empty() {
            return Err(InfraError::invalid_config(format!(
                "service {} needs private subnets",
                name
            )));
        }
        let load_balancer_subnets = props.vpc.public_subnet_ids();
        if load_balancer_subnets.is_empty() {
            return Err(InfraError::invalid_config(format!(
                "service {} needs public subnets for its load balancer",
                name
            )));
        }

        let repository_id = logical_id(&[name, "repository"]);
        template.add_resource(
            Resource::new(&repository_id, "AWS::ECR::Repository")
                .with_property("RepositoryName", qualified.as_str())
                .with_property(
                    "ImageScanningConfiguration",
                    Value::map([("ScanOnPush", Value::Bool(true))]),
                )
                .with_property("Tags", tags.clone())
                .with_deletion_policy(DeletionPolicy::Retain),
        )?;
        let repository_uri = Value::get_att(&repository_id, "RepositoryUri");

        let log_group_id = logical_id(&[name, "log-group"]);
        template.add_resource(
            Resource::new(&log_group_id, "AWS::Logs::LogGroup")
                .with_property("LogGroupName", format!("/ecs/{}", qualified))
                .with_property("RetentionInDays", LOG_RETENTION_DAYS),
        )?;

        let secret_arns: Vec<Value> = props.secrets.iter().map(|(_, arn)| arn.clone()).collect();
        let mut execution_role = RoleBuilder::new(
            logical_id(&[name, "execution-role"]),
            "ecs-tasks.amazonaws.com",
        )
        .managed_policy("service-role/AmazonECSTaskExecutionRolePolicy");
        if !secret_arns.is_empty() {
            execution_role = execution_role.allow(&["secretsmanager:GetSecretValue"], secret_arns);
        }
        let execution_role = execution_role.build(template)?;
        let task_role =
            RoleBuilder::new(logical_id(&[name, "task-role"]), "ecs-tasks.amazonaws.com")
                .build(template)?;

        let image = match &config.image {
            Some(image) => Value::str(image),
            None => Value::join("", [repository_uri.clone(), Value::str(":latest")]),
        };

        let mut variables: Vec<(String, Value)> = config
            .environment
            .iter()
            .map(|(key, value)| (key.clone(), Value::str(value)))
            .collect();
        variables.extend(props.environment);

        let mut container = vec![
            ("Name", Value::str(name)),
            ("Image", image),
            ("Essential", Value::Bool(true)),
            (
                "PortMappings",
                Value::list([Value::map([
                    ("ContainerPort", Value::from(port)),
                    ("Protocol", Value::str("tcp")),
                ])]),
            ),
            (
                "LogConfiguration",
                Value::map([
                    ("LogDriver", Value::str("awslogs")),
                    (
                        "Options",
                        Value::map([
                            ("awslogs-group", Value::reference(&log_group_id)),
                            ("awslogs-region", Value::reference("AWS::Region")),
                            ("awslogs-stream-prefix", Value::str(name)),
                        ]),
                    ),
                ]),
            ),
        ];
        if !variables.is_empty() {
            container.push((
                "Environment",
                Value::list(variables.into_iter().map(|(key, value)| {
                    Value::map([("Name", Value::str(key)), ("Value", value)])
                })),
            ));
        }
        if !props.secrets.is_empty() {
            container.push((
                "Secrets",
                Value::list(props.secrets.into_iter().map(|(key, arn)| {
                    Value::map([("Name", Value::str(key)), ("ValueFrom", arn)])
                })),
            ));
        }

        let task_id = logical_id(&[name, "task-definition"]);
        template.add_resource(
            Resource::new(&task_id, "AWS::ECS::TaskDefinition")
                .with_property("Family", qualified.as_str())
                .with_property("Cpu", config.cpu().to_string())
                .with_property("Memory", config.memory().to_string())
                .with_property("NetworkMode", "awsvpc")
                .with_property("RequiresCompatibilities", Value::list([Value::str("FARGATE")]))
                .with_property("ExecutionRoleArn", execution_role.arn())
                .with_property("TaskRoleArn", task_role.arn())
                .with_property("ContainerDefinitions", Value::list([Value::map(container)]))
                .with_property("Tags", tags.clone()),
        )?;

        let lb_security_group = SecurityGroupBuilder::new(
            logical_id(&[name, "load-balancer-security-group"]),
            format!("Public HTTP access to {}", qualified),
            props.vpc.vpc_id(),
        )
        .allow_cidr("0.0.0.0/0", LISTENER_PORT, "HTTP from anywhere")
        .tags(tags.clone())
        .build(template)?;

        let security_group = SecurityGroupBuilder::new(
            logical_id(&[name, "security-group"]),
            format!("Tasks of {}", qualified),
            props.vpc.vpc_id(),
        )
        .tags(tags.clone())
        .build(template)?;
        security_group.allow_from(template, &lb_security_group, port, "Load balancer to tasks")?;

        let load_balancer_id = logical_id(&[name, "load-balancer"]);
        template.add_resource(
            Resource::new(&load_balancer_id, "AWS::ElasticLoadBalancingV2::LoadBalancer")
                .with_property("Type", "application")
                .with_property("Scheme", "internet-facing")
                .with_property("Subnets", Value::List(load_balancer_subnets))
                .with_property("SecurityGroups", Value::list([lb_security_group.group_id()]))
                .with_property("Tags", tags.clone()),
        )?;

        let target_group_id = logical_id(&[name, "target-group"]);
        template.add_resource(
            Resource::new(&target_group_id, "AWS::ElasticLoadBalancingV2::TargetGroup")
                .with_property("TargetType", "ip")
                .with_property("Protocol", "HTTP")
                .with_property("Port", port)
                .with_property("VpcId", props.vpc.vpc_id())
                .with_property("HealthCheckPath", config.route_path())
                .with_property("Tags", tags.clone()),
        )?;

        let listener_id = logical_id(&[name, "listener"]);
        template.add_resource(
            Resource::new(&listener_id, "AWS::ElasticLoadBalancingV2::Listener")
                .with_property("LoadBalancerArn", Value::reference(&load_balancer_id))
                .with_property("Protocol", "HTTP")
                .with_property("Port", LISTENER_PORT)
                .with_property(
                    "DefaultActions",
                    Value::list([Value::map([
                        ("Type", Value::str("forward")),
                        ("TargetGroupArn", Value::reference(&target_group_id)),
                    ])]),
                ),
        )?;

        let service_id = logical_id(&[name, "service"]);
        template.add_resource(
            Resource::new(&service_id, "AWS::ECS::Service")
                .with_property("ServiceName", qualified.as_str())
                .with_property("Cluster", props.cluster.reference())
                .with_property("LaunchType", "FARGATE")
                .with_property("DesiredCount", config.desired_count())
                .with_property("TaskDefinition", Value::reference(&task_id))
                .with_property("HealthCheckGracePeriodSeconds", 60u32)
                .with_property(
                    "NetworkConfiguration",
                    Value::map([(
                        "AwsvpcConfiguration",
                        Value::map([
                            ("AssignPublicIp", Value::str("DISABLED")),
                            ("Subnets", Value::List(task_subnets)),
                            ("SecurityGroups", Value::list([security_group.group_id()])),
                        ]),
                    )]),
                )
                .with_property(
                    "LoadBalancers",
                    Value::list([Value::map([
                        ("ContainerName", Value::str(name)),
                        ("ContainerPort", Value::from(port)),
                        ("TargetGroupArn", Value::reference(&target_group_id)),
                    ])]),
                )
                .with_property("Tags", tags.clone())
                .depends_on(&listener_id),
        )?;

        build_scaling(template, name, config, props.cluster, &service_id)?;

        template.add_output(
            Output::new(
                logical_id(&[name, "load-balancer-dns"]),
                Value::get_att(&load_balancer_id, "DNSName"),
            )
            .with_description(format!("Load balancer address of {}", qualified)),
        )?;

        if let Some(domain) = props.domain {
            let record_name = config.domain_name(environment, domain);
            template.add_resource(
                Resource::new(logical_id(&[name, "dns-record"]), "AWS::Route53::RecordSet")
                    .with_property("HostedZoneId", domain.hosted_zone_id.as_str())
                    .with_property("Name", record_name.as_str())
                    .with_property("Type", "A")
                    .with_property(
                        "AliasTarget",
                        Value::map([
                            ("DNSName", Value::get_att(&load_balancer_id, "DNSName")),
                            (
                                "HostedZoneId",
                                Value::get_att(&load_balancer_id, "CanonicalHostedZoneID"),
                            ),
                        ]),
                    ),
            )?;
            tracing::debug!("Service {} reachable at {}", qualified, record_name);
        }

        let build_role = RoleBuilder::new(logical_id(&[name, "code-build-role"]), "codebuild.amazonaws.com")
            .named(format!("{}-code-build-role", qualified))
            .managed_policy("AmazonEC2ContainerRegistryPowerUser")
            .managed_policy("CloudWatchLogsFullAccess")
            .build(template)?;

        let spec = buildspec::service(name, &config.source_path());
        let build_project_name = ProjectBuilder::new(
            logical_id(&[name, "build-project"]),
            format!("{}-build-project", qualified),
            build_role.arn(),
            &spec,
        )
        .privileged()
        .variable(IMAGE_REPO_URI_VAR, repository_uri)
        .tags(tags)
        .build(template)?;

        Ok(Self {
            name: name.to_string(),
            service_logical_id: service_id,
            repository_logical_id: repository_id,
            security_group,
            build_project_name,
            build_role,
            cluster: props.cluster.reference(),
        })
    }

    /// Service name as the deploy provider expects it
    pub fn service_name(&self) -> Value {
        Value::get_att(&self.service_logical_id, "Name")
    }
}

fn build_scaling(
    template: &mut Template,
    name: &str,
    config: &ServiceConfig,
    cluster: &ComputeCluster,
    service_id: &str,
) -> Result<()> {
    let target_id = logical_id(&[name, "scalable-target"]);
    template.add_resource(
        Resource::new(&target_id, "AWS::ApplicationAutoScaling::ScalableTarget")
            .with_property("MinCapacity", config.min_capacity())
            .with_property("MaxCapacity", config.max_capacity())
            .with_property("ServiceNamespace", "ecs")
            .with_property("ScalableDimension", "ecs:service:DesiredCount")
            .with_property(
                "ResourceId",
                Value::join(
                    "/",
                    [
                        Value::str("service"),
                        cluster.reference(),
                        Value::get_att(service_id, "Name"),
                    ],
                ),
            )
            .with_property(
                "RoleARN",
                Value::sub(
                    "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/aws-service-role/ecs.application-autoscaling.amazonaws.com/AWSServiceRoleForApplicationAutoScaling_ECSService",
                ),
            ),
    )?;

    for (label, metric, target) in [
        ("cpu-scaling", "ECSServiceAverageCPUUtilization", config.cpu_target()),
        ("memory-scaling", "ECSServiceAverageMemoryUtilization", config.memory_target()),
    ] {
        let policy_name = logical_id(&[name, label]);
        template.add_resource(
            Resource::new(&policy_name, "AWS::ApplicationAutoScaling::ScalingPolicy")
                .with_property("PolicyName", policy_name.as_str())
                .with_property("PolicyType", "TargetTrackingScaling")
                .with_property("ScalingTargetId", Value::reference(&target_id))
                .with_property(
                    "TargetTrackingScalingPolicyConfiguration",
                    Value::map([
                        (
                            "PredefinedMetricSpecification",
                            Value::map([("PredefinedMetricType", Value::str(metric))]),
                        ),
                        ("TargetValue", Value::from(target)),
                    ]),
                ),
        )?;
    }
    Ok(())
}

impl Connectable for Service {
    fn security_group_id(&self) -> Value {
        self.security_group.group_id()
    }

    fn connection_id(&self) -> &str {
        &self.security_group.logical_id
    }
}

impl Pipelineable for Service {
    fn unit_name(&self) -> &str {
        &self.name
    }

    fn build_actions(&self, artifacts: &ActionArtifacts) -> Vec<Action> {
        vec![Action::codebuild(
            format!("{}-codebuild-build-action", self.name),
            self.build_project_name.as_str(),
            artifacts.input.clone(),
            artifacts.output.clone(),
            2,
        )]
    }

    fn deploy_actions(&self, artifacts: &ActionArtifacts) -> Vec<Action> {
        vec![Action::ecs_deploy(
            format!("{}-deploy-action", self.name),
            self.cluster.clone(),
            self.service_name(),
            artifacts.input.clone(),
            3,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructs::vpc::{SubnetGroup, SubnetType, VpcConfig};
    use crate::pipeline::{ActionKind, Artifact};

    struct Fixture {
        template: Template,
        vpc: PillarVpc,
        cluster: ComputeCluster,
    }

    fn fixture() -> Fixture {
        let mut template = Template::new();
        let vpc = PillarVpc::build(&mut template, "vpc", Environment::Dev, &VpcConfig::default())
            .unwrap();
        let cluster = ComputeCluster::build(&mut template, &vpc, "pillar", Environment::Dev).unwrap();
        Fixture {
            template,
            vpc,
            cluster,
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig {
            name: Some("recipe-service".to_string()),
            ..Default::default()
        }
    }

    fn build(f: &mut Fixture, config: &ServiceConfig, domain: Option<&DomainConfig>) -> Result<Service> {
        Service::build(
            &mut f.template,
            Environment::Dev,
            config,
            ServiceProps {
                vpc: &f.vpc,
                cluster: &f.cluster,
                domain,
                environment: vec![("RECIPES_DB_HOST".to_string(), Value::str("db.local"))],
                secrets: vec![(
                    "RECIPES_DB_PASSWORD".to_string(),
                    Value::reference("RecipesPasswordSecret"),
                )],
            },
        )
    }

    #[test]
    fn test_task_definition_defaults() {
        let mut f = fixture();
        build(&mut f, &config(), None).unwrap();

        let json = f.template.to_json().unwrap();
        let task = &json["Resources"]["RecipeServiceTaskDefinition"]["Properties"];
        assert_eq!(task["Cpu"], "512");
        assert_eq!(task["Memory"], "1024");
        let container = &task["ContainerDefinitions"][0];
        assert_eq!(container["Name"], "recipe-service");
        assert_eq!(container["PortMappings"][0]["ContainerPort"], 3000);
        assert_eq!(container["Environment"][0]["Name"], "RECIPES_DB_HOST");
        assert_eq!(container["Secrets"][0]["ValueFrom"]["Ref"], "RecipesPasswordSecret");

        let target_group = &json["Resources"]["RecipeServiceTargetGroup"]["Properties"];
        assert_eq!(target_group["HealthCheckPath"], "/health");
        assert!(f.template.resource("RecipeServiceDnsRecord").is_none());
    }

    #[test]
    fn test_scaling_policies() {
        let mut f = fixture();
        build(&mut f, &config(), None).unwrap();

        let target = f.template.resource("RecipeServiceScalableTarget").unwrap();
        assert_eq!(target.property("MinCapacity"), Some(&Value::Int(1)));
        assert_eq!(target.property("MaxCapacity"), Some(&Value::Int(4)));
        assert_eq!(
            f.template
                .count_of_type("AWS::ApplicationAutoScaling::ScalingPolicy"),
            2
        );
    }

    #[test]
    fn test_dns_record_with_domain() {
        let mut f = fixture();
        let domain = DomainConfig {
            zone_name: "example.com".to_string(),
            hosted_zone_id: "Z123".to_string(),
        };
        build(&mut f, &config(), Some(&domain)).unwrap();

        let record = f.template.resource("RecipeServiceDnsRecord").unwrap();
        assert_eq!(
            record.property("Name"),
            Some(&Value::str("recipe-service-dev.example.com"))
        );
    }

    #[test]
    fn test_domain_name_is_bare_only_in_prod() {
        let domain = DomainConfig {
            zone_name: "example.com".to_string(),
            hosted_zone_id: "Z123".to_string(),
        };
        let config = config();

        assert_eq!(
            config.domain_name(Environment::Prod, &domain),
            "recipe-service.example.com"
        );
        assert_eq!(
            config.domain_name(Environment::Demo, &domain),
            "recipe-service-demo.example.com"
        );
    }

    #[test]
    fn test_requires_private_subnets() {
        let mut template = Template::new();
        let vpc_config = VpcConfig {
            subnet_groups: Some(vec![
                SubnetGroup::new("Public", SubnetType::Public),
                SubnetGroup::new("Isolated", SubnetType::Isolated),
            ]),
            ..Default::default()
        };
        let vpc = PillarVpc::build(&mut template, "vpc", Environment::Dev, &vpc_config).unwrap();
        let cluster = ComputeCluster::build(&mut template, &vpc, "pillar", Environment::Dev).unwrap();

        let err = Service::build(
            &mut template,
            Environment::Dev,
            &config(),
            ServiceProps {
                vpc: &vpc,
                cluster: &cluster,
                domain: None,
                environment: vec![],
                secrets: vec![],
            },
        )
        .unwrap_err();

        assert!(matches!(err, InfraError::InvalidConfig(msg) if msg.contains("private subnets")));
        assert!(template.resource("RecipeServiceRepository").is_none());
    }

    #[test]
    fn test_rejects_inverted_capacity() {
        let mut f = fixture();
        let config = ServiceConfig {
            min_capacity: Some(5),
            ..config()
        };
        let err = build(&mut f, &config, None).unwrap_err();
        assert!(matches!(err, InfraError::CapacityRange { min: 5, max: 4, .. }));
    }

    #[test]
    fn test_pipeline_actions() {
        let mut f = fixture();
        let service = build(&mut f, &config(), None).unwrap();
        let artifacts = ActionArtifacts {
            input: Artifact::new("source-output"),
            output: Some(Artifact::build_output("recipe-service")),
        };

        let build_actions = service.build_actions(&artifacts);
        assert_eq!(build_actions.len(), 1);
        assert_eq!(build_actions[0].name, "recipe-service-codebuild-build-action");
        assert_eq!(build_actions[0].run_order, 2);
        assert_eq!(build_actions[0].outputs, vec![Artifact::build_output("recipe-service")]);

        let deploy = service.deploy_actions(&ActionArtifacts {
            input: Artifact::build_output("recipe-service"),
            output: None,
        });
        assert_eq!(deploy[0].name, "recipe-service-deploy-action");
        assert_eq!(deploy[0].run_order, 3);
        assert!(matches!(deploy[0].kind, ActionKind::EcsDeploy { .. }));

        let project = f.template.resource("RecipeServiceBuildProject").unwrap();
        let env = project.property("Environment").unwrap();
        assert_eq!(env.get("PrivilegedMode"), Some(&Value::Bool(true)));
    }
}
