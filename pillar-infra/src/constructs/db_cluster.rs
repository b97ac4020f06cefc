//! Serverless relational database cluster

use serde::Deserialize;

use crate::constructs::security::{Connectable, SecurityGroup, SecurityGroupBuilder};
use crate::constructs::tags;
use crate::constructs::vpc::PillarVpc;
use crate::environment::Environment;
use crate::error::{InfraError, Result};
use crate::template::{DeletionPolicy, Output, Resource, Template, Value, logical_id};

/// Lowest capacity the serverless engine accepts
pub const MIN_CAPACITY: u32 = 2;

const DEFAULT_ENGINE: &str = "aurora-postgresql";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_MAX_CAPACITY: u32 = 4;
const DEFAULT_AUTO_PAUSE_SECONDS: u32 = 600;
const PASSWORD_LENGTH: u32 = 16;
const PASSWORD_EXCLUDED_CHARACTERS: &str = "/@\" ";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbClusterConfig {
    /// Default: "database"
    pub name: Option<String>,
    /// Default: aurora-postgresql
    pub engine: Option<String>,
    /// Default: 5432
    pub port: Option<u16>,
    /// Default: 2, the engine minimum
    pub min_capacity: Option<u32>,
    /// Default: 4
    pub max_capacity: Option<u32>,
    /// Idle time before the cluster pauses. Default: 600
    pub auto_pause_seconds: Option<u32>,
}

impl DbClusterConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("database")
    }

    pub fn engine(&self) -> &str {
        self.engine.as_deref().unwrap_or(DEFAULT_ENGINE)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn min_capacity(&self) -> u32 {
        self.min_capacity.unwrap_or(MIN_CAPACITY)
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY)
    }

    pub fn auto_pause_seconds(&self) -> u32 {
        self.auto_pause_seconds.unwrap_or(DEFAULT_AUTO_PAUSE_SECONDS)
    }

    pub fn validate(&self) -> Result<()> {
        let (min, max) = (self.min_capacity(), self.max_capacity());
        if min < MIN_CAPACITY {
            return Err(InfraError::MinimumCapacity {
                name: self.name().to_string(),
                minimum: MIN_CAPACITY,
            });
        }
        if max < min {
            return Err(InfraError::CapacityRange {
                name: self.name().to_string(),
                min,
                max,
            });
        }
        Ok(())
    }
}

/// Handle to the database cluster
///
/// Carries the connection details consumers need. The master password only
/// exists inside the generated secret and is never exposed here.
#[derive(Debug, Clone)]
pub struct DbCluster {
    pub logical_id: String,
    pub cluster_name: String,
    pub database_name: String,
    pub username: String,
    pub port: u16,
    pub security_group: SecurityGroup,
    secret_id: String,
}

impl DbCluster {
    pub fn build(
        template: &mut Template,
        vpc: &PillarVpc,
        environment: Environment,
        config: &DbClusterConfig,
    ) -> Result<Self> {
        config.validate()?;

        let name = config.name();
        let cluster_name = format!("{}-{}", name, environment);
        let database_name = cluster_name.replace('-', "_");
        let username = format!("{}_admin", database_name);
        let description = format!("Database cluster for {} in {}", name, environment);
        let port = config.port();

        let subnet_ids = vpc.isolated_subnet_ids();
        if subnet_ids.is_empty() {
            return Err(InfraError::invalid_config(
                "database cluster needs isolated subnets",
            ));
        }

        let secret_id = logical_id(&[name, "password-secret"]);
        template.add_resource(
            Resource::new(&secret_id, "AWS::SecretsManager::Secret")
                .with_property("Name", format!("{}-password", cluster_name))
                .with_property("Description", format!("Master password for {}", cluster_name))
                .with_property(
                    "GenerateSecretString",
                    Value::map([
                        ("PasswordLength", Value::from(PASSWORD_LENGTH)),
                        ("ExcludePunctuation", Value::Bool(true)),
                        ("ExcludeCharacters", Value::str(PASSWORD_EXCLUDED_CHARACTERS)),
                    ]),
                )
                .with_property("Tags", tags(name, environment, &description)),
        )?;

        let subnet_group_id = logical_id(&[name, "subnet-group"]);
        template.add_resource(
            Resource::new(&subnet_group_id, "AWS::RDS::DBSubnetGroup")
                .with_property(
                    "DBSubnetGroupDescription",
                    format!("Isolated subnets for {}", cluster_name),
                )
                .with_property("SubnetIds", Value::List(subnet_ids))
                .with_property("Tags", tags(name, environment, &description)),
        )?;

        let security_group = SecurityGroupBuilder::new(
            logical_id(&[name, "security-group"]),
            format!("Access to the {} database cluster", cluster_name),
            vpc.vpc_id(),
        )
        .tags(tags(name, environment, &description))
        .build(template)?;

        let master_password = Value::join(
            "",
            [
                Value::str("{{resolve:secretsmanager:"),
                Value::reference(&secret_id),
                Value::str(":SecretString}}"),
            ],
        );

        let id = logical_id(&[name, "db-cluster"]);
        template.add_resource(
            Resource::new(&id, "AWS::RDS::DBCluster")
                .with_property("DBClusterIdentifier", cluster_name.as_str())
                .with_property("Engine", config.engine())
                .with_property("EngineMode", "serverless")
                .with_property("DatabaseName", database_name.as_str())
                .with_property("MasterUsername", username.as_str())
                .with_property("MasterUserPassword", master_password)
                .with_property("Port", port)
                .with_property("DBSubnetGroupName", Value::reference(&subnet_group_id))
                .with_property("VpcSecurityGroupIds", Value::list([security_group.group_id()]))
                .with_property("StorageEncrypted", true)
                .with_property("EnableHttpEndpoint", true)
                .with_property(
                    "ScalingConfiguration",
                    Value::map([
                        ("AutoPause", Value::Bool(true)),
                        ("MinCapacity", Value::from(config.min_capacity())),
                        ("MaxCapacity", Value::from(config.max_capacity())),
                        (
                            "SecondsUntilAutoPause",
                            Value::from(config.auto_pause_seconds()),
                        ),
                    ]),
                )
                .with_property("Tags", tags(name, environment, &description))
                .depends_on(&subnet_group_id)
                .with_deletion_policy(DeletionPolicy::Snapshot),
        )?;

        template.add_output(
            Output::new(logical_id(&[name, "username"]), Value::str(&username))
                .with_description(format!("Master username for {}", cluster_name))
                .with_export(format!("{}-username", cluster_name)),
        )?;
        template.add_output(
            Output::new(
                logical_id(&[name, "password-secret-arn"]),
                Value::reference(&secret_id),
            )
            .with_description(format!("Secret holding the master password for {}", cluster_name))
            .with_export(format!("{}-password-secret-arn", cluster_name)),
        )?;

        tracing::debug!(
            "Built database cluster {} ({} to {} capacity units)",
            cluster_name,
            config.min_capacity(),
            config.max_capacity()
        );

        Ok(Self {
            logical_id: id,
            cluster_name,
            database_name,
            username,
            port,
            security_group,
            secret_id,
        })
    }

    pub fn endpoint_address(&self) -> Value {
        Value::get_att(&self.logical_id, "Endpoint.Address")
    }

    /// ARN of the secret holding the master password
    pub fn password_secret_arn(&self) -> Value {
        Value::reference(&self.secret_id)
    }

    /// Opens the database port to `peer`
    pub fn allow_connection(&self, template: &mut Template, peer: &dyn Connectable) -> Result<()> {
        self.security_group.allow_from(
            template,
            peer,
            self.port,
            &format!("Database access to {}", self.cluster_name),
        )
    }
}
