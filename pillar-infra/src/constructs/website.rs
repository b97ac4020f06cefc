//! Static website served from a bucket through a CDN distribution

use serde::Deserialize;

use crate::buildspec::{self, BUCKET_NAME_VAR, DISTRIBUTION_ID_VAR};
use crate::constructs::codebuild::ProjectBuilder;
use crate::constructs::iam::{Role, RoleBuilder};
use crate::constructs::{DomainConfig, tags};
use crate::environment::Environment;
use crate::error::Result;
use crate::pipeline::{Action, ActionArtifacts, Pipelineable};
use crate::template::{DeletionPolicy, Output, Resource, Template, Value, logical_id};

/// Hosted zone id CloudFront alias records point at, fixed for every region
const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";
const ORIGIN_ID: &str = "website-bucket-origin";
const ORIGIN_PATH: &str = "/live";
const INDEX_DOCUMENT: &str = "index.html";
const ERROR_DOCUMENT: &str = "error.html";
const ERROR_CACHING_MIN_TTL: u32 = 300;
const LOG_PREFIX: &str = "logs";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebsiteConfig {
    /// Default: "website"
    pub name: Option<String>,
    /// Directory holding the web application. Default: the website name
    pub source_path: Option<String>,
    /// Label under the zone the site is served from. Default: the zone apex
    /// in prod and `<environment>` elsewhere
    pub subdomain: Option<String>,
}

impl WebsiteConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("website")
    }

    pub fn source_path(&self) -> &str {
        self.source_path.as_deref().unwrap_or_else(|| self.name())
    }

    /// Fully qualified site name inside `domain`
    pub fn domain_name(&self, environment: Environment, domain: &DomainConfig) -> String {
        match (&self.subdomain, environment) {
            (Some(label), _) => format!("{}.{}", label, domain.zone_name),
            (None, Environment::Prod) => domain.zone_name.clone(),
            (None, _) => format!("{}.{}", environment, domain.zone_name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Website {
    name: String,
    pub bucket_logical_id: String,
    pub bucket_name: String,
    pub distribution_logical_id: String,
    pub domain_name: Option<String>,
    pub build_project_name: String,
    pub deploy_project_name: String,
    pub build_role: Role,
}

impl Website {
    pub fn build(
        template: &mut Template,
        environment: Environment,
        config: &WebsiteConfig,
        domain: Option<&DomainConfig>,
    ) -> Result<Self> {
        let name = config.name();
        let qualified = environment.qualify(name);
        let description = format!("CloudFront website for {} running in {}", name, environment);
        let tags = tags(name, environment, &description);
        let domain_name = domain.map(|d| config.domain_name(environment, d));

        let certificate_id = logical_id(&[name, "cert"]);
        if let (Some(domain), Some(domain_name)) = (domain, &domain_name) {
            template.add_resource(
                Resource::new(&certificate_id, "AWS::CertificateManager::Certificate")
                    .with_property("DomainName", domain_name.as_str())
                    .with_property("ValidationMethod", "DNS")
                    .with_property(
                        "DomainValidationOptions",
                        Value::list([Value::map([
                            ("DomainName", Value::str(domain_name)),
                            ("HostedZoneId", Value::str(&domain.hosted_zone_id)),
                        ])]),
                    )
                    .with_property("Tags", tags.clone()),
            )?;
        }

        let bucket_name = match &domain_name {
            Some(domain_name) => format!("{}-assets", domain_name.replace('.', "-")),
            None => format!("{}-assets", qualified),
        }
        .to_lowercase();

        let bucket_id = logical_id(&[name, "bucket"]);
        template.add_resource(
            Resource::new(&bucket_id, "AWS::S3::Bucket")
                .with_property("BucketName", bucket_name.as_str())
                .with_property(
                    "WebsiteConfiguration",
                    Value::map([
                        ("IndexDocument", Value::str(INDEX_DOCUMENT)),
                        ("ErrorDocument", Value::str(ERROR_DOCUMENT)),
                    ]),
                )
                .with_property(
                    "PublicAccessBlockConfiguration",
                    Value::map([
                        ("BlockPublicAcls", Value::Bool(false)),
                        ("BlockPublicPolicy", Value::Bool(false)),
                        ("IgnorePublicAcls", Value::Bool(false)),
                        ("RestrictPublicBuckets", Value::Bool(false)),
                    ]),
                )
                // access logs are written with ACLs
                .with_property(
                    "OwnershipControls",
                    Value::map([(
                        "Rules",
                        Value::list([Value::map([(
                            "ObjectOwnership",
                            Value::str("ObjectWriter"),
                        )])]),
                    )]),
                )
                .with_property("Tags", tags.clone())
                .with_deletion_policy(DeletionPolicy::Delete),
        )?;

        template.add_resource(
            Resource::new(logical_id(&[name, "bucket-policy"]), "AWS::S3::BucketPolicy")
                .with_property("Bucket", Value::reference(&bucket_id))
                .with_property(
                    "PolicyDocument",
                    Value::map([
                        ("Version", Value::str("2012-10-17")),
                        (
                            "Statement",
                            Value::list([Value::map([
                                ("Effect", Value::str("Allow")),
                                ("Principal", Value::str("*")),
                                ("Action", Value::str("s3:GetObject")),
                                (
                                    "Resource",
                                    Value::join(
                                        "",
                                        [Value::get_att(&bucket_id, "Arn"), Value::str("/*")],
                                    ),
                                ),
                            ])]),
                        ),
                    ]),
                ),
        )?;

        let distribution_id = logical_id(&[name, "distribution"]);
        let viewer_certificate = match domain {
            Some(_) => Value::map([
                ("AcmCertificateArn", Value::reference(&certificate_id)),
                ("SslSupportMethod", Value::str("sni-only")),
                ("MinimumProtocolVersion", Value::str("TLSv1.1_2016")),
            ]),
            None => Value::map([("CloudFrontDefaultCertificate", Value::Bool(true))]),
        };
        let error_responses = [403u32, 404].map(|code| {
            Value::map([
                ("ErrorCode", Value::from(code)),
                ("ErrorCachingMinTTL", Value::from(ERROR_CACHING_MIN_TTL)),
                ("ResponseCode", Value::from(200u32)),
                ("ResponsePagePath", Value::str(format!("/{}", INDEX_DOCUMENT))),
            ])
        });

        let mut distribution = vec![
            ("Enabled", Value::Bool(true)),
            ("DefaultRootObject", Value::str(INDEX_DOCUMENT)),
            (
                "Origins",
                Value::list([Value::map([
                    ("Id", Value::str(ORIGIN_ID)),
                    ("DomainName", Value::get_att(&bucket_id, "RegionalDomainName")),
                    ("OriginPath", Value::str(ORIGIN_PATH)),
                    ("S3OriginConfig", Value::Map(Default::default())),
                ])]),
            ),
            (
                "DefaultCacheBehavior",
                Value::map([
                    ("TargetOriginId", Value::str(ORIGIN_ID)),
                    ("ViewerProtocolPolicy", Value::str("redirect-to-https")),
                    (
                        "AllowedMethods",
                        Value::list([Value::str("GET"), Value::str("HEAD")]),
                    ),
                    (
                        "ForwardedValues",
                        Value::map([("QueryString", Value::Bool(false))]),
                    ),
                ]),
            ),
            ("CustomErrorResponses", Value::list(error_responses)),
            (
                "Logging",
                Value::map([
                    ("Bucket", Value::get_att(&bucket_id, "DomainName")),
                    ("Prefix", Value::str(LOG_PREFIX)),
                ]),
            ),
            ("ViewerCertificate", viewer_certificate),
        ];
        if let Some(domain_name) = &domain_name {
            distribution.push(("Aliases", Value::list([Value::str(domain_name)])));
        }

        template.add_resource(
            Resource::new(&distribution_id, "AWS::CloudFront::Distribution")
                .with_property("DistributionConfig", Value::map(distribution))
                .with_property("Tags", tags.clone()),
        )?;

        if let (Some(domain), Some(domain_name)) = (domain, &domain_name) {
            template.add_resource(
                Resource::new(logical_id(&[name, "a-record"]), "AWS::Route53::RecordSet")
                    .with_property("HostedZoneId", domain.hosted_zone_id.as_str())
                    .with_property("Name", domain_name.as_str())
                    .with_property("Type", "A")
                    .with_property(
                        "AliasTarget",
                        Value::map([
                            ("DNSName", Value::get_att(&distribution_id, "DomainName")),
                            ("HostedZoneId", Value::str(CLOUDFRONT_HOSTED_ZONE_ID)),
                        ]),
                    ),
            )?;
        }

        template.add_output(
            Output::new(logical_id(&[name, "bucket-arn"]), Value::get_att(&bucket_id, "Arn"))
                .with_description(format!("ARN for the {} bucket", bucket_name))
                .with_export(format!("{}-bucket-arn", qualified)),
        )?;
        template.add_output(
            Output::new(logical_id(&[name, "bucket-name"]), Value::reference(&bucket_id))
                .with_description(format!("Name for the {} bucket", bucket_name))
                .with_export(format!("{}-bucket-name", qualified)),
        )?;
        template.add_output(
            Output::new(
                logical_id(&[name, "distribution-id"]),
                Value::reference(&distribution_id),
            )
            .with_description(format!("Distribution ID for {}-distribution", name))
            .with_export(format!("{}-distribution-id", qualified)),
        )?;

        let build_role = RoleBuilder::new(logical_id(&[name, "code-build-role"]), "codebuild.amazonaws.com")
            .named(format!("{}-code-build-role", qualified))
            .managed_policy("AmazonS3FullAccess")
            .managed_policy("CloudFrontFullAccess")
            .managed_policy("CloudWatchLogsFullAccess")
            .build(template)?;

        let build_spec = buildspec::website_build(name, config.source_path());
        let build_project_name = ProjectBuilder::new(
            logical_id(&[name, "build-project"]),
            format!("{}-build-project", qualified),
            build_role.arn(),
            &build_spec,
        )
        .tags(tags.clone())
        .build(template)?;

        let deploy_spec = buildspec::website_deploy(name);
        let deploy_project_name = ProjectBuilder::new(
            logical_id(&[name, "deploy-project"]),
            format!("{}-deploy-project", qualified),
            build_role.arn(),
            &deploy_spec,
        )
        .variable(BUCKET_NAME_VAR, Value::reference(&bucket_id))
        .variable(DISTRIBUTION_ID_VAR, Value::reference(&distribution_id))
        .tags(tags)
        .build(template)?;

        tracing::debug!(
            "Built website {} (bucket {}, domain {})",
            qualified,
            bucket_name,
            domain_name.as_deref().unwrap_or("none")
        );

        Ok(Self {
            name: name.to_string(),
            bucket_logical_id: bucket_id,
            bucket_name,
            distribution_logical_id: distribution_id,
            domain_name,
            build_project_name,
            deploy_project_name,
            build_role,
        })
    }
}

impl Pipelineable for Website {
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
        vec![Action::codebuild_deploy(
            format!("{}-deploy-action", self.name),
            self.deploy_project_name.as_str(),
            artifacts.input.clone(),
            3,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Artifact, Category};

    fn domain() -> DomainConfig {
        DomainConfig {
            zone_name: "example.com".to_string(),
            hosted_zone_id: "Z123".to_string(),
        }
    }

    #[test]
    fn test_distribution_serves_live_prefix() {
        let mut template = Template::new();
        let website =
            Website::build(&mut template, Environment::Prod, &WebsiteConfig::default(), None)
                .unwrap();

        assert_eq!(website.bucket_name, "website-assets");
        assert!(website.domain_name.is_none());
        assert_eq!(template.count_of_type("AWS::CertificateManager::Certificate"), 0);
        assert_eq!(template.count_of_type("AWS::Route53::RecordSet"), 0);

        let json = template.to_json().unwrap();
        let config = &json["Resources"]["WebsiteDistribution"]["Properties"]["DistributionConfig"];
        assert_eq!(config["Origins"][0]["OriginPath"], "/live");
        assert_eq!(config["CustomErrorResponses"][0]["ErrorCode"], 403);
        assert_eq!(config["CustomErrorResponses"][1]["ErrorCode"], 404);
        assert_eq!(config["CustomErrorResponses"][1]["ResponseCode"], 200);
        assert_eq!(config["CustomErrorResponses"][1]["ResponsePagePath"], "/index.html");
        assert_eq!(config["Logging"]["Prefix"], "logs");
        assert_eq!(config["ViewerCertificate"]["CloudFrontDefaultCertificate"], true);
        assert!(config.get("Aliases").is_none());
    }

    #[test]
    fn test_domain_adds_certificate_alias_and_record() {
        let mut template = Template::new();
        let website = Website::build(
            &mut template,
            Environment::Dev,
            &WebsiteConfig::default(),
            Some(&domain()),
        )
        .unwrap();

        assert_eq!(website.domain_name.as_deref(), Some("dev.example.com"));
        assert_eq!(website.bucket_name, "dev-example-com-assets");
        assert!(template.resource("WebsiteCert").is_some());

        let json = template.to_json().unwrap();
        let config = &json["Resources"]["WebsiteDistribution"]["Properties"]["DistributionConfig"];
        assert_eq!(config["Aliases"][0], "dev.example.com");
        assert_eq!(config["ViewerCertificate"]["AcmCertificateArn"]["Ref"], "WebsiteCert");

        let record = &json["Resources"]["WebsiteARecord"]["Properties"];
        assert_eq!(record["AliasTarget"]["HostedZoneId"], "Z2FDTNDATAQYW2");
    }

    #[test]
    fn test_domain_name_selection() {
        let config = WebsiteConfig::default();
        assert_eq!(config.domain_name(Environment::Prod, &domain()), "example.com");
        assert_eq!(config.domain_name(Environment::Demo, &domain()), "demo.example.com");

        let config = WebsiteConfig {
            subdomain: Some("www".to_string()),
            ..Default::default()
        };
        assert_eq!(config.domain_name(Environment::Prod, &domain()), "www.example.com");
    }

    #[test]
    fn test_deploy_project_receives_bucket_and_distribution() {
        let mut template = Template::new();
        let website =
            Website::build(&mut template, Environment::Dev, &WebsiteConfig::default(), None)
                .unwrap();

        let json = template.to_json().unwrap();
        let variables = &json["Resources"]["WebsiteDeployProject"]["Properties"]["Environment"]
            ["EnvironmentVariables"];
        assert_eq!(variables[0]["Name"], "BUCKET_NAME");
        assert_eq!(variables[0]["Value"]["Ref"], "WebsiteBucket");
        assert_eq!(variables[1]["Value"]["Ref"], "WebsiteDistribution");

        let deploy = website.deploy_actions(&ActionArtifacts {
            input: Artifact::build_output("website"),
            output: None,
        });
        assert_eq!(deploy[0].name, "website-deploy-action");
        assert_eq!(deploy[0].category(), Category::Deploy);
        assert_eq!(deploy[0].inputs, vec![Artifact::build_output("website")]);
    }
}
