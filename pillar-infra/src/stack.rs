//! Stack - composition root for one environment
//!
//! Builds every construct in dependency order, wires network permissions
//! between them and registers the deployable units with the pipeline.

use serde::Deserialize;

use crate::constructs::DomainConfig;
use crate::constructs::asset_bucket::{AssetBucket, AssetBucketConfig};
use crate::constructs::bastion::{BastionConfig, BastionHost};
use crate::constructs::cluster::ComputeCluster;
use crate::constructs::db_cluster::{DbCluster, DbClusterConfig};
use crate::constructs::service::{Service, ServiceConfig, ServiceProps};
use crate::constructs::vpc::{PillarVpc, VpcConfig};
use crate::constructs::website::{Website, WebsiteConfig};
use crate::environment::Environment;
use crate::error::Result;
use crate::pipeline::{PipelineDefinition, PipelineManager, PipelineManagerProps};
use crate::template::{Template, Value};

const DEFAULT_NAME: &str = "pillar";
const DEFAULT_DATABASE_NAME: &str = "recipes";
const DEFAULT_WEBSITE_NAME: &str = "website";
const DEFAULT_SERVICE_NAME: &str = "recipe-service";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Branch the pipeline follows. Default: the environment name
    pub branch: Option<String>,
    /// Redeploy the stack from source before building. Default: false
    pub update_infrastructure: Option<bool>,
    /// Workspace directory the stack is synthesized from. Default: "."
    pub infrastructure_source_path: Option<String>,
}

/// Stack configuration, usually read from `pillar.toml`
///
/// Every section is optional; an empty file synthesizes the default stack.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Default: "pillar"
    pub name: Option<String>,
    /// Public zone for the website and service records. Default: none, the
    /// site is served from the distribution's own hostname
    pub domain: Option<DomainConfig>,
    /// CodeCommit repository holding the workspace. Default: the stack name
    pub repository_name: Option<String>,
    pub vpc: VpcConfig,
    pub bastion: BastionConfig,
    pub asset_bucket: AssetBucketConfig,
    /// Database name defaults to "recipes"
    pub database: DbClusterConfig,
    /// Website name defaults to "website"
    pub website: WebsiteConfig,
    /// Service name defaults to "recipe-service", source to
    /// "services/recipe-service"
    pub service: ServiceConfig,
    pub pipeline: PipelineConfig,
}

impl StackConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    pub fn repository_name(&self) -> &str {
        self.repository_name.as_deref().unwrap_or_else(|| self.name())
    }

    pub fn stack_name(&self, environment: Environment) -> String {
        format!("{}-{}", self.name(), environment)
    }

    pub fn database(&self) -> DbClusterConfig {
        let mut database = self.database.clone();
        database
            .name
            .get_or_insert_with(|| DEFAULT_DATABASE_NAME.to_string());
        database
    }

    pub fn website(&self) -> WebsiteConfig {
        let mut website = self.website.clone();
        website
            .name
            .get_or_insert_with(|| DEFAULT_WEBSITE_NAME.to_string());
        website
    }

    pub fn service(&self) -> ServiceConfig {
        let mut service = self.service.clone();
        service
            .name
            .get_or_insert_with(|| DEFAULT_SERVICE_NAME.to_string());
        service
    }
}

/// A synthesized environment
#[derive(Debug, Clone)]
pub struct PillarStack {
    environment: Environment,
    stack_name: String,
    template: Template,
    pipeline: PipelineDefinition,
}

impl PillarStack {
    pub fn synthesize(environment: Environment, config: &StackConfig) -> Result<Self> {
        let name = config.name();
        let stack_name = config.stack_name(environment);

        tracing::info!("Synthesizing stack {}", stack_name);

        let mut template = Template::new()
            .with_description(format!("{} stack for the {} environment", name, environment));

        let vpc = PillarVpc::build(&mut template, "vpc", environment, &config.vpc)?;
        let bastion = BastionHost::build(&mut template, &vpc, environment, &config.bastion)?;
        AssetBucket::build(&mut template, environment, &config.asset_bucket)?;

        let database = DbCluster::build(&mut template, &vpc, environment, &config.database())?;
        database.allow_connection(&mut template, &bastion)?;

        let website = Website::build(
            &mut template,
            environment,
            &config.website(),
            config.domain.as_ref(),
        )?;

        let cluster = ComputeCluster::build(&mut template, &vpc, name, environment)?;
        let service_config = config.service();
        let service = Service::build(
            &mut template,
            environment,
            &service_config,
            ServiceProps {
                vpc: &vpc,
                cluster: &cluster,
                domain: config.domain.as_ref(),
                environment: database_environment(&database, &service_config),
                secrets: vec![(
                    "RECIPES_DB_PASSWORD".to_string(),
                    database.password_secret_arn(),
                )],
            },
        )?;
        database.allow_connection(&mut template, &service)?;

        let mut manager = PipelineManager::new(PipelineManagerProps {
            name: name.to_string(),
            environment,
            repository_name: config.repository_name().to_string(),
            branch: config.pipeline.branch.clone(),
            update_infrastructure: config.pipeline.update_infrastructure.unwrap_or(false),
            infrastructure_source_path: config
                .pipeline
                .infrastructure_source_path
                .clone()
                .unwrap_or_else(|| ".".to_string()),
            stack_name: stack_name.clone(),
        });
        manager.register_constructs(&[&website, &service])?;
        let pipeline = manager.synthesize(&mut template)?;

        tracing::info!(
            "Stack {} synthesized with {} resources",
            stack_name,
            template.resources().len()
        );

        Ok(Self {
            environment,
            stack_name,
            template,
            pipeline,
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }
}

/// Connection settings the recipes service reads at start
fn database_environment(database: &DbCluster, service: &ServiceConfig) -> Vec<(String, Value)> {
    vec![
        ("RECIPES_DB_HOST".to_string(), database.endpoint_address()),
        ("RECIPES_DB_PORT".to_string(), Value::str(database.port.to_string())),
        ("RECIPES_DB_NAME".to_string(), Value::str(&database.database_name)),
        ("RECIPES_DB_USERNAME".to_string(), Value::str(&database.username)),
        ("RECIPES_DB_SYNC".to_string(), Value::str("true")),
        ("NAME".to_string(), Value::str(service.name())),
        ("PORT".to_string(), Value::str(service.container_port().to_string())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InfraError;
    use crate::pipeline::StageKind;

    #[test]
    fn test_every_environment_synthesizes_one_of_each() {
        for environment in Environment::ALL {
            let stack = PillarStack::synthesize(environment, &StackConfig::default()).unwrap();
            let template = stack.template();

            assert_eq!(template.count_of_type("AWS::EC2::VPC"), 1, "{}", environment);
            assert_eq!(template.count_of_type("AWS::RDS::DBCluster"), 1);
            assert_eq!(template.count_of_type("AWS::CloudFront::Distribution"), 1);
            assert_eq!(template.count_of_type("AWS::ECS::Service"), 1);
            assert_eq!(template.count_of_type("AWS::CodePipeline::Pipeline"), 1);
            assert_eq!(
                stack.pipeline().stage_kinds(),
                vec![StageKind::Source, StageKind::Build, StageKind::Deploy]
            );
            assert!(stack.pipeline().is_linear());
        }
    }

    #[test]
    fn test_database_below_minimum_capacity() {
        let config = StackConfig {
            database: DbClusterConfig {
                min_capacity: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = PillarStack::synthesize(Environment::Dev, &config).unwrap_err();
        assert!(matches!(err, InfraError::MinimumCapacity { .. }));
        assert_eq!(err.to_string(), "Minimum scaling capacity for recipes is 2");
    }

    #[test]
    fn test_infrastructure_updates_add_a_stage() {
        let config = StackConfig::from_toml_str(
            r#"
            [pipeline]
            update_infrastructure = true
            "#,
        )
        .unwrap();
        let stack = PillarStack::synthesize(Environment::Prod, &config).unwrap();

        assert_eq!(
            stack.pipeline().stage_kinds(),
            vec![
                StageKind::Source,
                StageKind::UpdateInfrastructure,
                StageKind::Build,
                StageKind::Deploy
            ]
        );
    }

    #[test]
    fn test_pipeline_pools_both_units() {
        let stack = PillarStack::synthesize(Environment::Dev, &StackConfig::default()).unwrap();
        let build = stack.pipeline().stage(StageKind::Build).unwrap();
        let names: Vec<&str> = build.actions.iter().map(|a| a.name.as_str()).collect();

        assert_eq!(
            names,
            vec!["website-codebuild-build-action", "recipe-service-codebuild-build-action"]
        );
    }

    #[test]
    fn test_service_reaches_database() {
        let stack = PillarStack::synthesize(Environment::Dev, &StackConfig::default()).unwrap();
        let template = stack.template();

        assert!(template
            .resource("RecipesSecurityGroupFromRecipeServiceSecurityGroupPort5432")
            .is_some());
        assert!(template
            .resource("RecipesSecurityGroupFromBastionSecurityGroupPort5432")
            .is_some());

        let json = template.to_json().unwrap();
        let container = &json["Resources"]["RecipeServiceTaskDefinition"]["Properties"]
            ["ContainerDefinitions"][0];
        assert_eq!(container["Environment"][0]["Name"], "RECIPES_DB_HOST");
        assert_eq!(
            container["Environment"][0]["Value"]["Fn::GetAtt"][1],
            "Endpoint.Address"
        );
        assert_eq!(container["Secrets"][0]["Name"], "RECIPES_DB_PASSWORD");
    }

    #[test]
    fn test_config_from_toml() {
        let config = StackConfig::from_toml_str(
            r#"
            name = "cookbook"

            [domain]
            zone_name = "example.com"
            hosted_zone_id = "Z123"

            [database]
            max_capacity = 8

            [service]
            container_port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.name(), "cookbook");
        assert_eq!(config.repository_name(), "cookbook");
        assert_eq!(config.database().name(), "recipes");
        assert_eq!(config.database().max_capacity(), 8);
        assert_eq!(config.service().container_port(), 8080);
        assert_eq!(config.service().source_path(), "services/recipe-service");

        let stack = PillarStack::synthesize(Environment::Prod, &config).unwrap();
        assert_eq!(stack.stack_name(), "cookbook-prod");
        assert!(stack.template().resource("WebsiteARecord").is_some());
        assert!(stack.template().to_json_pretty().is_ok());
    }

    #[test]
    fn test_record_names_differ_per_environment() {
        let config = StackConfig::from_toml_str(
            r#"
            [domain]
            zone_name = "example.com"
            hosted_zone_id = "Z123"
            "#,
        )
        .unwrap();

        let record_names = |environment: Environment| {
            let stack = PillarStack::synthesize(environment, &config).unwrap();
            let json = stack.template().to_json().unwrap();
            let name = |id: &str| json["Resources"][id]["Properties"]["Name"].clone();
            (name("RecipeServiceDnsRecord"), name("WebsiteARecord"))
        };

        let (dev_service, dev_website) = record_names(Environment::Dev);
        let (prod_service, prod_website) = record_names(Environment::Prod);

        assert_eq!(dev_service, "recipe-service-dev.example.com");
        assert_eq!(prod_service, "recipe-service.example.com");
        assert_ne!(dev_website, prod_website);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = StackConfig::from_toml_str("colour = \"blue\"").unwrap_err();
        assert!(matches!(err, InfraError::ConfigParse(_)));
    }
}
