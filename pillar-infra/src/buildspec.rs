//! CodeBuild build specifications
//!
//! Commands are opaque shell run by the CI service. Values only known at
//! deploy time (repository URI, bucket name, distribution id) reach the
//! scripts as project environment variables, never as template tokens
//! inside the script text.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;

const BUILDSPEC_VERSION: &str = "0.2";
const NODE_RUNTIME: &str = "12";
const PUBLIC_READ_GRANTEE: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Environment variable carrying the ECR repository URI into service builds
pub const IMAGE_REPO_URI_VAR: &str = "IMAGE_REPO_URI";
/// Environment variable carrying the website bucket name into deploys
pub const BUCKET_NAME_VAR: &str = "BUCKET_NAME";
/// Environment variable carrying the CloudFront distribution id into deploys
pub const DISTRIBUTION_ID_VAR: &str = "DISTRIBUTION_ID";
/// Environment variable naming the environment an infrastructure build targets
pub const STACK_ENVIRONMENT_VAR: &str = "PILLAR_ENVIRONMENT";
/// Environment variable naming the stack an infrastructure build updates
pub const STACK_NAME_VAR: &str = "PILLAR_STACK_NAME";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSpec {
    pub version: &'static str,
    pub phases: Phases,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<BuildArtifacts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Phases {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_build: Option<Phase>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Phase {
    #[serde(
        rename = "runtime-versions",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub runtime_versions: BTreeMap<String, String>,
    pub commands: Vec<String>,
}

impl Phase {
    pub fn commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            runtime_versions: BTreeMap::new(),
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_runtime(mut self, runtime: &str, version: &str) -> Self {
        self.runtime_versions
            .insert(runtime.to_string(), version.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildArtifacts {
    pub files: Vec<String>,
    #[serde(rename = "base-directory", skip_serializing_if = "Option::is_none")]
    pub base_directory: Option<String>,
    #[serde(rename = "discard-paths", skip_serializing_if = "Option::is_none")]
    pub discard_paths: Option<bool>,
}

impl BuildSpec {
    fn new(phases: Phases) -> Self {
        Self {
            version: BUILDSPEC_VERSION,
            phases,
            artifacts: None,
        }
    }

    fn with_artifacts(mut self, artifacts: BuildArtifacts) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Renders the spec as the string CodeBuild expects in `Source.BuildSpec`
    pub fn render(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every command across all phases, in execution order
    pub fn all_commands(&self) -> impl Iterator<Item = &str> {
        [
            &self.phases.install,
            &self.phases.pre_build,
            &self.phases.build,
            &self.phases.post_build,
        ]
        .into_iter()
        .flatten()
        .flat_map(|phase| phase.commands.iter().map(String::as_str))
    }
}

/// Synthesizes and deploys the stack itself from the checked out source
pub fn infrastructure(name: &str, source_path: &str) -> BuildSpec {
    BuildSpec::new(Phases {
        install: Some(Phase::commands([
            "echo Build started at `date`".to_string(),
            format!("echo Beginning build operations for \"{}\"", name),
            "echo Installing the Rust toolchain...".to_string(),
            "curl https://sh.rustup.rs -sSf | sh -s -- -y --profile minimal".to_string(),
            ". $HOME/.cargo/env".to_string(),
            format!("cd {}", source_path),
        ])),
        build: Some(Phase::commands([
            format!(
                "cargo run --release -p pillar-cli -- synth --environment ${} --output template.json",
                STACK_ENVIRONMENT_VAR
            ),
        ])),
        post_build: Some(Phase::commands([
            "echo Updating the infrastructure stack...".to_string(),
            format!(
                "aws cloudformation deploy --template-file template.json --stack-name ${} --capabilities CAPABILITY_NAMED_IAM --no-fail-on-empty-changeset",
                STACK_NAME_VAR
            ),
            "echo Build completed at `date`".to_string(),
        ])),
        ..Default::default()
    })
}

/// Builds a container image, pushes it and emits `imagedefinitions.json`
pub fn service(name: &str, source_path: &str) -> BuildSpec {
    BuildSpec::new(Phases {
        pre_build: Some(Phase::commands([
            "echo Build started at `date`".to_string(),
            format!("echo Beginning build operations for \"{}\"", name),
            "echo Logging in to AWS ECR...".to_string(),
            format!(
                "aws ecr get-login-password --region $AWS_DEFAULT_REGION | docker login --username AWS --password-stdin ${{{}%%/*}}",
                IMAGE_REPO_URI_VAR
            ),
        ])),
        build: Some(Phase::commands([
            "echo Building the Docker image...".to_string(),
            format!("cd {}", source_path),
            "export BUILD_TAG=${CODEBUILD_RESOLVED_SOURCE_VERSION:0:8}".to_string(),
            "echo BUILD_TAG: $BUILD_TAG".to_string(),
            "echo Tagging the Docker image...".to_string(),
            format!("docker build -t {} .", name),
            format!("docker tag {}:latest ${}:$BUILD_TAG", name, IMAGE_REPO_URI_VAR),
        ])),
        post_build: Some(Phase::commands([
            "echo Pushing the Docker image...".to_string(),
            format!("docker push ${}:$BUILD_TAG", IMAGE_REPO_URI_VAR),
            "echo Saving new imagedefinitions.json as a build artifact...".to_string(),
            format!(
                "printf '[{{\"name\": \"{}\", \"imageUri\": \"%s:%s\"}}]' ${} $BUILD_TAG > imagedefinitions.json",
                name, IMAGE_REPO_URI_VAR
            ),
            "cat imagedefinitions.json".to_string(),
            "echo Build completed on `date`".to_string(),
        ])),
        ..Default::default()
    })
    .with_artifacts(BuildArtifacts {
        files: vec!["imagedefinitions.json".to_string()],
        base_directory: Some(source_path.to_string()),
        discard_paths: Some(true),
    })
}

/// Installs, tests and builds a static web application
pub fn website_build(name: &str, source_path: &str) -> BuildSpec {
    BuildSpec::new(Phases {
        install: Some(
            Phase::commands([
                "echo Build started at `date`".to_string(),
                format!("echo Beginning build operations for \"{}\"", name),
                format!("cd {}", source_path),
                "echo Installing NPM Dependencies...".to_string(),
                "npm install".to_string(),
                "echo Installation Complete".to_string(),
            ])
            .with_runtime("nodejs", NODE_RUNTIME),
        ),
        pre_build: Some(Phase::commands(["echo Running tests...", "CI=true npm test"])),
        build: Some(Phase::commands([
            "echo building web app...",
            "CI=true npm run build",
            "echo Build completed on `date`",
        ])),
        ..Default::default()
    })
    .with_artifacts(BuildArtifacts {
        files: vec!["build/**/*".to_string()],
        base_directory: Some(source_path.to_string()),
        discard_paths: None,
    })
}

/// Publishes a built site: versioned copy, swap of `live/`, cache invalidation
pub fn website_deploy(name: &str) -> BuildSpec {
    let version_path = format!("${}/versions/$CODEBUILD_BUILD_NUMBER", BUCKET_NAME_VAR);

    BuildSpec::new(Phases {
        install: Some(
            Phase::commands([
                "echo Deploy started at `date`".to_string(),
                format!("echo Beginning deploy operations for \"{}\"", name),
                "aws --version".to_string(),
            ])
            .with_runtime("nodejs", NODE_RUNTIME),
        ),
        pre_build: Some(Phase::commands([
            format!("echo Copying build files to {}...", version_path),
            format!("aws s3 cp build s3://{} --recursive", version_path),
        ])),
        build: Some(Phase::commands([
            "echo Copying build files to CloudFront origin folder...".to_string(),
            format!("aws s3 rm s3://${}/live --recursive", BUCKET_NAME_VAR),
            format!(
                "aws s3 cp build s3://${}/live --recursive --grants read=uri={}",
                BUCKET_NAME_VAR, PUBLIC_READ_GRANTEE
            ),
        ])),
        post_build: Some(Phase::commands([
            "echo Creating CloudFront invalidation to reset the cache...".to_string(),
            format!(
                "aws cloudfront create-invalidation --distribution-id ${} --paths \"/index.html\"",
                DISTRIBUTION_ID_VAR
            ),
            "echo Deploy completed on `date`".to_string(),
        ])),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_spec_writes_image_definitions() {
        let spec = service("recipe-service", "services/recipe-service");
        let json: serde_json::Value = serde_json::from_str(&spec.render().unwrap()).unwrap();

        assert_eq!(json["version"], "0.2");
        assert_eq!(json["artifacts"]["files"][0], "imagedefinitions.json");
        assert_eq!(json["artifacts"]["base-directory"], "services/recipe-service");
        assert_eq!(json["artifacts"]["discard-paths"], true);
        assert!(json["phases"].get("install").is_none());

        let printf = spec
            .all_commands()
            .find(|c| c.starts_with("printf"))
            .unwrap();
        assert!(printf.contains(r#""name": "recipe-service""#));
        assert!(printf.contains("$IMAGE_REPO_URI"));
    }

    #[test]
    fn test_website_build_pins_node_runtime() {
        let spec = website_build("website", "web");
        let json = serde_json::to_value(&spec).unwrap();

        assert_eq!(json["phases"]["install"]["runtime-versions"]["nodejs"], "12");
        assert!(json["phases"]["pre_build"].get("runtime-versions").is_none());
        assert_eq!(json["artifacts"]["files"][0], "build/**/*");
    }

    #[test]
    fn test_website_deploy_uses_project_variables() {
        let spec = website_deploy("website");
        let commands: Vec<&str> = spec.all_commands().collect();

        assert!(commands.iter().any(|c| c.contains("--distribution-id $DISTRIBUTION_ID")));
        assert!(commands.iter().any(|c| c.contains("s3://$BUCKET_NAME/live")));
        assert!(spec.artifacts.is_none());
    }

    #[test]
    fn test_infrastructure_spec_deploys_synthesized_template() {
        let spec = infrastructure("pillar", ".");
        assert!(spec.all_commands().any(|c| c.contains("pillar-cli -- synth")));
        assert!(spec.all_commands().any(|c| c.starts_with("aws cloudformation deploy")));
    }
}
