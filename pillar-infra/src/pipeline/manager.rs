//! Pipeline manager - owns the source stage and pools unit actions

use crate::buildspec::{self, STACK_ENVIRONMENT_VAR, STACK_NAME_VAR};
use crate::constructs::codebuild::ProjectBuilder;
use crate::constructs::iam::RoleBuilder;
use crate::constructs::tags;
use crate::environment::Environment;
use crate::error::{InfraError, Result};
use crate::pipeline::{
    Action, ActionArtifacts, ActionSet, Artifact, PipelineDefinition, Pipelineable, Placement,
    Stage, StageKind,
};
use crate::template::{DeletionPolicy, Resource, Template, Value, logical_id};

const SOURCE_OUTPUT: &str = "source-output";

#[derive(Debug, Clone)]
pub struct PipelineManagerProps {
    pub name: String,
    pub environment: Environment,
    /// Existing CodeCommit repository the pipeline checks out
    pub repository_name: String,
    /// Branch to follow. Default: the environment name
    pub branch: Option<String>,
    /// Adds a stage that redeploys the stack itself before the build
    pub update_infrastructure: bool,
    /// Workspace directory the infrastructure build runs from
    pub infrastructure_source_path: String,
    /// Stack the infrastructure stage updates
    pub stack_name: String,
}

impl PipelineManagerProps {
    pub fn branch(&self) -> &str {
        self.branch
            .as_deref()
            .unwrap_or_else(|| self.environment.as_str())
    }
}

/// Collects actions from deployable units and assembles one linear pipeline
///
/// Units are asked for their actions at registration; the resulting sets
/// only grow, and an action already present (same name) is skipped, so
/// registering a unit twice changes nothing.
#[derive(Debug, Clone)]
pub struct PipelineManager {
    props: PipelineManagerProps,
    source_output: Artifact,
    build_actions: ActionSet,
    deploy_actions: ActionSet,
}

impl PipelineManager {
    pub fn new(props: PipelineManagerProps) -> Self {
        Self {
            props,
            source_output: Artifact::new(SOURCE_OUTPUT),
            build_actions: ActionSet::new(),
            deploy_actions: ActionSet::new(),
        }
    }

    pub fn source_output(&self) -> &Artifact {
        &self.source_output
    }

    pub fn build_actions(&self) -> &ActionSet {
        &self.build_actions
    }

    pub fn deploy_actions(&self) -> &ActionSet {
        &self.deploy_actions
    }

    /// Pools the build and deploy actions of each unit
    ///
    /// Fails when a unit contributes an action whose name is already taken
    /// by a different action.
    pub fn register_constructs(&mut self, units: &[&dyn Pipelineable]) -> Result<()> {
        for unit in units {
            let build_output = Artifact::build_output(unit.unit_name());

            let build = unit.build_actions(&ActionArtifacts {
                input: self.source_output.clone(),
                output: Some(build_output.clone()),
            });
            let deploy = unit.deploy_actions(&ActionArtifacts {
                input: build_output,
                output: None,
            });

            for action in build {
                let name = action.name.clone();
                if !self.build_actions.insert(action)? {
                    tracing::debug!("Build action {} already registered", name);
                }
            }
            for action in deploy {
                let name = action.name.clone();
                if !self.deploy_actions.insert(action)? {
                    tracing::debug!("Deploy action {} already registered", name);
                }
            }

            tracing::debug!("Registered unit {}", unit.unit_name());
        }

        Ok(())
    }

    fn pipeline_name(&self) -> String {
        format!("{}-pipeline", self.props.environment.qualify(&self.props.name))
    }

    fn infrastructure_project_name(&self) -> String {
        format!(
            "{}-infrastructure-project",
            self.props.environment.qualify(&self.props.name)
        )
    }

    /// Stage chain in fixed order, each stage placed just after the previous
    pub fn compose(&self) -> Result<PipelineDefinition> {
        let environment = self.props.environment.as_str();
        let mut chain: Vec<(StageKind, Vec<Action>)> = vec![(
            StageKind::Source,
            vec![Action::codecommit_source(
                format!("{}-codecommit-source-action", self.props.name),
                self.props.repository_name.as_str(),
                self.props.branch(),
                self.source_output.clone(),
            )],
        )];

        if self.props.update_infrastructure {
            chain.push((
                StageKind::UpdateInfrastructure,
                vec![Action::codebuild(
                    format!("{}-infrastructure-build-action", self.props.name),
                    self.infrastructure_project_name(),
                    self.source_output.clone(),
                    None,
                    1,
                )],
            ));
        }

        chain.push((StageKind::Build, self.build_actions.to_vec()));
        chain.push((StageKind::Deploy, self.deploy_actions.to_vec()));

        let mut stages: Vec<Stage> = Vec::with_capacity(chain.len());
        for (kind, actions) in chain {
            let name = kind.stage_name(environment);
            if actions.is_empty() {
                return Err(InfraError::EmptyStage(name));
            }
            let placement = match stages.last() {
                Some(previous) => Placement::JustAfter(previous.name.clone()),
                None => Placement::First,
            };
            stages.push(Stage {
                name,
                kind,
                actions,
                placement,
            });
        }

        Ok(PipelineDefinition {
            name: self.pipeline_name(),
            stages,
        })
    }

    /// Composes the pipeline and adds it with its supporting resources
    pub fn synthesize(&self, template: &mut Template) -> Result<PipelineDefinition> {
        let definition = self.compose()?;
        let name = self.props.name.as_str();
        let environment = self.props.environment;
        let description = format!("Pipeline for {} running in {}", name, environment);

        let bucket_id = logical_id(&[name, "artifact-bucket"]);
        template.add_resource(
            Resource::new(&bucket_id, "AWS::S3::Bucket")
                .with_property(
                    "BucketEncryption",
                    Value::map([(
                        "ServerSideEncryptionConfiguration",
                        Value::list([Value::map([(
                            "ServerSideEncryptionByDefault",
                            Value::map([("SSEAlgorithm", Value::str("aws:kms"))]),
                        )])]),
                    )]),
                )
                .with_property("Tags", tags(name, environment, &description))
                .with_deletion_policy(DeletionPolicy::Retain),
        )?;

        let role = RoleBuilder::new(logical_id(&[name, "pipeline-role"]), "codepipeline.amazonaws.com")
            .allow(
                &["s3:GetObject", "s3:GetObjectVersion", "s3:GetBucketVersioning", "s3:PutObject"],
                vec![
                    Value::get_att(&bucket_id, "Arn"),
                    Value::join("", [Value::get_att(&bucket_id, "Arn"), Value::str("/*")]),
                ],
            )
            .allow(
                &[
                    "codecommit:GetBranch",
                    "codecommit:GetCommit",
                    "codecommit:UploadArchive",
                    "codecommit:GetUploadArchiveStatus",
                    "codecommit:CancelUploadArchive",
                ],
                vec![Value::sub(format!(
                    "arn:${{AWS::Partition}}:codecommit:${{AWS::Region}}:${{AWS::AccountId}}:{}",
                    self.props.repository_name
                ))],
            )
            .allow(&["codebuild:BatchGetBuilds", "codebuild:StartBuild"], vec![Value::str("*")])
            .allow(
                &[
                    "ecs:DescribeServices",
                    "ecs:DescribeTaskDefinition",
                    "ecs:DescribeTasks",
                    "ecs:ListTasks",
                    "ecs:RegisterTaskDefinition",
                    "ecs:UpdateService",
                    "iam:PassRole",
                ],
                vec![Value::str("*")],
            )
            .build(template)?;

        if self.props.update_infrastructure {
            let qualified = environment.qualify(name);
            let infrastructure_role = RoleBuilder::new(
                logical_id(&[name, "infrastructure-code-build-role"]),
                "codebuild.amazonaws.com",
            )
            .named(format!("{}-infrastructure-code-build-role", qualified))
            .managed_policy("AdministratorAccess")
            .build(template)?;

            let spec = buildspec::infrastructure(name, &self.props.infrastructure_source_path);
            ProjectBuilder::new(
                logical_id(&[name, "infrastructure-project"]),
                self.infrastructure_project_name(),
                infrastructure_role.arn(),
                &spec,
            )
            .privileged()
            .variable(STACK_ENVIRONMENT_VAR, environment.as_str())
            .variable(STACK_NAME_VAR, self.props.stack_name.as_str())
            .tags(tags(name, environment, &description))
            .build(template)?;
        }

        template.add_resource(
            Resource::new(logical_id(&[name, "pipeline"]), "AWS::CodePipeline::Pipeline")
                .with_property("Name", definition.name.as_str())
                .with_property("RoleArn", role.arn())
                .with_property("RestartExecutionOnUpdate", true)
                .with_property(
                    "ArtifactStore",
                    Value::map([
                        ("Type", Value::str("S3")),
                        ("Location", Value::reference(&bucket_id)),
                    ]),
                )
                .with_property(
                    "Stages",
                    Value::list(definition.stages.iter().map(Stage::to_value)),
                )
                .with_property("Tags", tags(name, environment, &description))
                .depends_on(&role.logical_id),
        )?;

        tracing::info!(
            "Pipeline {} composed with {} stages",
            definition.name,
            definition.stages.len()
        );

        Ok(definition)
    }
}
