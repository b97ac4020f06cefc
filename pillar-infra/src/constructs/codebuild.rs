//! CodeBuild projects driven by a pipeline

use crate::buildspec::BuildSpec;
use crate::error::Result;
use crate::template::{Resource, Template, Value};

const BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:3.0";

/// A project that reads and writes pipeline artifacts
#[derive(Debug, Clone)]
pub struct ProjectBuilder<'a> {
    logical_id: String,
    project_name: String,
    role_arn: Value,
    spec: &'a BuildSpec,
    privileged: bool,
    variables: Vec<(String, Value)>,
    tags: Option<Value>,
}

impl<'a> ProjectBuilder<'a> {
    pub fn new(
        logical_id: impl Into<String>,
        project_name: impl Into<String>,
        role_arn: Value,
        spec: &'a BuildSpec,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            project_name: project_name.into(),
            role_arn,
            spec,
            privileged: false,
            variables: Vec::new(),
            tags: None,
        }
    }

    /// Docker builds need a privileged container
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.push((name.to_string(), value.into()));
        self
    }

    pub fn tags(mut self, tags: Value) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Adds the project and returns its name for use in actions
    pub fn build(self, template: &mut Template) -> Result<String> {
        let mut environment = vec![
            ("ComputeType", Value::str("BUILD_GENERAL1_SMALL")),
            ("Image", Value::str(BUILD_IMAGE)),
            ("Type", Value::str("LINUX_CONTAINER")),
            ("PrivilegedMode", Value::Bool(self.privileged)),
        ];
        if !self.variables.is_empty() {
            environment.push((
                "EnvironmentVariables",
                Value::list(self.variables.into_iter().map(|(name, value)| {
                    Value::map([
                        ("Name", Value::str(name)),
                        ("Type", Value::str("PLAINTEXT")),
                        ("Value", value),
                    ])
                })),
            ));
        }

        let resource = Resource::new(&self.logical_id, "AWS::CodeBuild::Project")
            .with_property("Name", self.project_name.as_str())
            .with_property("ServiceRole", self.role_arn)
            .with_property(
                "Source",
                Value::map([
                    ("Type", Value::str("CODEPIPELINE")),
                    ("BuildSpec", Value::str(self.spec.render()?)),
                ]),
            )
            .with_property("Artifacts", Value::map([("Type", Value::str("CODEPIPELINE"))]))
            .with_property("Environment", Value::map(environment))
            .with_optional_property("Tags", self.tags);

        template.add_resource(resource)?;
        Ok(self.project_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildspec;

    #[test]
    fn test_project_embeds_rendered_buildspec() {
        let mut template = Template::new();
        let spec = buildspec::website_deploy("web");
        let name = ProjectBuilder::new("WebDeploy", "web-deploy-project", Value::str("arn"), &spec)
            .variable("BUCKET_NAME", Value::reference("WebBucket"))
            .build(&mut template)
            .unwrap();

        assert_eq!(name, "web-deploy-project");

        let json = template.to_json().unwrap();
        let props = &json["Resources"]["WebDeploy"]["Properties"];
        assert_eq!(props["Source"]["Type"], "CODEPIPELINE");
        assert_eq!(props["Source"]["BuildSpec"], spec.render().unwrap());
        assert_eq!(props["Environment"]["PrivilegedMode"], false);
        assert_eq!(
            props["Environment"]["EnvironmentVariables"][0]["Value"]["Ref"],
            "WebBucket"
        );
    }
}
