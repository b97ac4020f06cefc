//! Pipeline - stages, actions and artifacts
//!
//! Deployable units contribute actions through the [`Pipelineable`] trait;
//! the [`PipelineManager`] pools them into shared build and deploy stages and
//! emits a single linear pipeline.

mod manager;

pub use manager::{PipelineManager, PipelineManagerProps};

use crate::error::{InfraError, Result};
use crate::template::Value;

/// Named handle for the output of one stage, consumed by the next
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    name: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Output of a unit's build actions
    pub fn build_output(unit: &str) -> Self {
        Self::new(format!("{}-build-output", unit))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn to_value(&self) -> Value {
        Value::map([("Name", Value::str(&self.name))])
    }
}

/// Artifacts handed to a unit when it is asked for actions
#[derive(Debug, Clone)]
pub struct ActionArtifacts {
    pub input: Artifact,
    pub output: Option<Artifact>,
}

/// What an action does and which provider runs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Checkout of a CodeCommit branch
    CodeCommitSource {
        repository_name: Value,
        branch: String,
    },
    /// CodeBuild project run, used for both builds and script deploys
    CodeBuild { project_name: Value, category: Category },
    /// Rolling update of an ECS service from `imagedefinitions.json`
    EcsDeploy {
        cluster_name: Value,
        service_name: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Source,
    Build,
    Deploy,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Source => "Source",
            Category::Build => "Build",
            Category::Deploy => "Deploy",
        }
    }
}

/// A unit of work inside a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    pub inputs: Vec<Artifact>,
    pub outputs: Vec<Artifact>,
    /// Execution order inside the stage; equal values run in parallel
    pub run_order: u32,
}

impl Action {
    pub fn codecommit_source(
        name: impl Into<String>,
        repository_name: impl Into<Value>,
        branch: impl Into<String>,
        output: Artifact,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::CodeCommitSource {
                repository_name: repository_name.into(),
                branch: branch.into(),
            },
            inputs: Vec::new(),
            outputs: vec![output],
            run_order: 1,
        }
    }

    /// CodeBuild run in the build stage
    pub fn codebuild(
        name: impl Into<String>,
        project_name: impl Into<Value>,
        input: Artifact,
        output: Option<Artifact>,
        run_order: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::CodeBuild {
                project_name: project_name.into(),
                category: Category::Build,
            },
            inputs: vec![input],
            outputs: output.into_iter().collect(),
            run_order,
        }
    }

    /// CodeBuild run whose script performs a deployment
    pub fn codebuild_deploy(
        name: impl Into<String>,
        project_name: impl Into<Value>,
        input: Artifact,
        run_order: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::CodeBuild {
                project_name: project_name.into(),
                category: Category::Deploy,
            },
            inputs: vec![input],
            outputs: Vec::new(),
            run_order,
        }
    }

    pub fn ecs_deploy(
        name: impl Into<String>,
        cluster_name: impl Into<Value>,
        service_name: impl Into<Value>,
        input: Artifact,
        run_order: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::EcsDeploy {
                cluster_name: cluster_name.into(),
                service_name: service_name.into(),
            },
            inputs: vec![input],
            outputs: Vec::new(),
            run_order,
        }
    }

    pub fn category(&self) -> Category {
        match &self.kind {
            ActionKind::CodeCommitSource { .. } => Category::Source,
            ActionKind::CodeBuild { category, .. } => *category,
            ActionKind::EcsDeploy { .. } => Category::Deploy,
        }
    }

    pub fn provider(&self) -> &'static str {
        match self.kind {
            ActionKind::CodeCommitSource { .. } => "CodeCommit",
            ActionKind::CodeBuild { .. } => "CodeBuild",
            ActionKind::EcsDeploy { .. } => "ECS",
        }
    }

    fn configuration(&self) -> Value {
        match &self.kind {
            ActionKind::CodeCommitSource {
                repository_name,
                branch,
            } => Value::map([
                ("RepositoryName", repository_name.clone()),
                ("BranchName", Value::str(branch)),
                ("PollForSourceChanges", Value::Bool(false)),
            ]),
            ActionKind::CodeBuild { project_name, .. } => {
                Value::map([("ProjectName", project_name.clone())])
            }
            ActionKind::EcsDeploy {
                cluster_name,
                service_name,
            } => Value::map([
                ("ClusterName", cluster_name.clone()),
                ("ServiceName", service_name.clone()),
                ("FileName", Value::str("imagedefinitions.json")),
            ]),
        }
    }

    /// Action declaration as it appears inside a pipeline stage
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            ("Name", Value::str(&self.name)),
            (
                "ActionTypeId",
                Value::map([
                    ("Category", Value::str(self.category().as_str())),
                    ("Owner", Value::str("AWS")),
                    ("Provider", Value::str(self.provider())),
                    ("Version", Value::str("1")),
                ]),
            ),
            ("Configuration", self.configuration()),
            ("RunOrder", Value::from(self.run_order)),
        ];
        if !self.inputs.is_empty() {
            entries.push((
                "InputArtifacts",
                Value::list(self.inputs.iter().map(Artifact::to_value)),
            ));
        }
        if !self.outputs.is_empty() {
            entries.push((
                "OutputArtifacts",
                Value::list(self.outputs.iter().map(Artifact::to_value)),
            ));
        }
        Value::map(entries)
    }
}

/// Insertion-ordered set of actions
///
/// Registering a unit twice yields identical actions, which are merged.
/// Two different actions may not share a name inside a stage.
#[derive(Debug, Clone, Default)]
pub struct ActionSet {
    actions: Vec<Action>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an identical action is already present
    pub fn insert(&mut self, action: Action) -> Result<bool> {
        match self.actions.iter().find(|a| a.name == action.name) {
            Some(existing) if *existing == action => Ok(false),
            Some(_) => Err(InfraError::DuplicateAction(action.name)),
            None => {
                self.actions.push(action);
                Ok(true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn to_vec(&self) -> Vec<Action> {
        self.actions.clone()
    }
}

/// Which phase of the chain a stage represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Source,
    UpdateInfrastructure,
    Build,
    Deploy,
}

impl StageKind {
    pub fn stage_name(&self, environment: &str) -> String {
        let prefix = match self {
            StageKind::Source => "source",
            StageKind::UpdateInfrastructure => "update-infrastructure",
            StageKind::Build => "build-application",
            StageKind::Deploy => "deploy-application",
        };
        format!("{}-{}", prefix, environment)
    }
}

/// Where a stage sits in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    First,
    JustAfter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
    pub actions: Vec<Action>,
    pub placement: Placement,
}

impl Stage {
    pub fn to_value(&self) -> Value {
        Value::map([
            ("Name", Value::str(&self.name)),
            (
                "Actions",
                Value::list(self.actions.iter().map(Action::to_value)),
            ),
        ])
    }
}

/// The assembled pipeline: stages in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    pub name: String,
    pub stages: Vec<Stage>,
}

impl PipelineDefinition {
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }

    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// True when the first stage is unplaced and every other stage sits
    /// immediately after its predecessor
    pub fn is_linear(&self) -> bool {
        self.stages.iter().enumerate().all(|(i, stage)| match (i, &stage.placement) {
            (0, Placement::First) => true,
            (0, _) => false,
            (i, Placement::JustAfter(previous)) => *previous == self.stages[i - 1].name,
            (_, Placement::First) => false,
        })
    }
}

/// A deployable unit able to contribute actions to a shared pipeline
pub trait Pipelineable {
    /// Unit name; action and artifact names derive from it
    fn unit_name(&self) -> &str;

    /// Actions turning the source artifact into `artifacts.output`
    fn build_actions(&self, artifacts: &ActionArtifacts) -> Vec<Action>;

    /// Actions releasing the build output held in `artifacts.input`
    fn deploy_actions(&self, artifacts: &ActionArtifacts) -> Vec<Action>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_set_merges_identical_actions() {
        let source = Artifact::new("source");
        let mut set = ActionSet::new();

        assert!(set.insert(Action::codebuild("a", "project-a", source.clone(), None, 2)).unwrap());
        assert!(!set.insert(Action::codebuild("a", "project-a", source.clone(), None, 2)).unwrap());
        assert!(set.insert(Action::codebuild("b", "project-b", source, None, 2)).unwrap());

        let names: Vec<&str> = set.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_action_set_rejects_conflicting_name() {
        let source = Artifact::new("source");
        let mut set = ActionSet::new();
        set.insert(Action::codebuild("a", "project-a", source.clone(), None, 2))
            .unwrap();

        let err = set
            .insert(Action::codebuild("a", "project-b", source, None, 2))
            .unwrap_err();
        assert!(matches!(err, InfraError::DuplicateAction(name) if name == "a"));
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.iter().next().unwrap().kind,
            ActionKind::CodeBuild {
                project_name: Value::str("project-a"),
                category: Category::Build,
            }
        );
    }

    #[test]
    fn test_action_declaration() {
        let action = Action::codebuild(
            "web-codebuild-build-action",
            "web-build-project",
            Artifact::new("source-output"),
            Some(Artifact::build_output("web")),
            2,
        );
        let json = serde_json::to_value(action.to_value()).unwrap();

        assert_eq!(json["ActionTypeId"]["Category"], "Build");
        assert_eq!(json["ActionTypeId"]["Provider"], "CodeBuild");
        assert_eq!(json["Configuration"]["ProjectName"], "web-build-project");
        assert_eq!(json["InputArtifacts"][0]["Name"], "source-output");
        assert_eq!(json["OutputArtifacts"][0]["Name"], "web-build-output");
        assert_eq!(json["RunOrder"], 2);
    }

    #[test]
    fn test_deploy_categories() {
        let input = Artifact::new("in");
        let script = Action::codebuild_deploy("d", "p", input.clone(), 3);
        let ecs = Action::ecs_deploy("e", "cluster", "service", input, 3);

        assert_eq!(script.category(), Category::Deploy);
        assert_eq!(script.provider(), "CodeBuild");
        assert_eq!(ecs.category(), Category::Deploy);
        assert_eq!(ecs.provider(), "ECS");
        assert!(ecs.outputs.is_empty());
    }

    #[test]
    fn test_linear_check() {
        let stage = |name: &str, kind, placement| Stage {
            name: name.to_string(),
            kind,
            actions: vec![],
            placement,
        };
        let mut pipeline = PipelineDefinition {
            name: "p".to_string(),
            stages: vec![
                stage("source", StageKind::Source, Placement::First),
                stage("build", StageKind::Build, Placement::JustAfter("source".into())),
                stage("deploy", StageKind::Deploy, Placement::JustAfter("build".into())),
            ],
        };
        assert!(pipeline.is_linear());

        pipeline.stages[2].placement = Placement::JustAfter("source".into());
        assert!(!pipeline.is_linear());
    }
}
