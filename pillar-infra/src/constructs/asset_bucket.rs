//! Private, encrypted bucket for application assets

use serde::Deserialize;

use crate::constructs::tags;
use crate::environment::Environment;
use crate::error::Result;
use crate::template::{DeletionPolicy, Output, Resource, Template, Value, logical_id};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetBucketConfig {
    /// Default: "assets"
    pub name: Option<String>,
    /// Keep the bucket when the stack is deleted. Default: false
    pub retain: Option<bool>,
}

impl AssetBucketConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("assets")
    }

    pub fn retain(&self) -> bool {
        self.retain.unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct AssetBucket {
    pub logical_id: String,
    pub bucket_name: String,
}

impl AssetBucket {
    pub fn build(
        template: &mut Template,
        environment: Environment,
        config: &AssetBucketConfig,
    ) -> Result<Self> {
        let name = config.name();
        let bucket_name = format!("{}-{}-bucket", name, environment).to_lowercase();
        let id = logical_id(&[name, "bucket"]);
        let policy = if config.retain() {
            DeletionPolicy::Retain
        } else {
            DeletionPolicy::Delete
        };

        template.add_resource(
            Resource::new(&id, "AWS::S3::Bucket")
                .with_property("BucketName", bucket_name.as_str())
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
                .with_property(
                    "PublicAccessBlockConfiguration",
                    Value::map([
                        ("BlockPublicAcls", Value::Bool(true)),
                        ("BlockPublicPolicy", Value::Bool(true)),
                        ("IgnorePublicAcls", Value::Bool(true)),
                        ("RestrictPublicBuckets", Value::Bool(true)),
                    ]),
                )
                .with_property(
                    "Tags",
                    tags(name, environment, &format!("Asset bucket for {}", environment)),
                )
                .with_deletion_policy(policy),
        )?;

        template.add_output(
            Output::new(logical_id(&[name, "bucket-name"]), Value::reference(&id))
                .with_description("Asset bucket name"),
        )?;

        Ok(Self {
            logical_id: id,
            bucket_name,
        })
    }

    pub fn arn(&self) -> Value {
        Value::get_att(&self.logical_id, "Arn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_is_private_and_encrypted() {
        let mut template = Template::new();
        let bucket =
            AssetBucket::build(&mut template, Environment::Prod, &AssetBucketConfig::default())
                .unwrap();

        assert_eq!(bucket.bucket_name, "assets-prod-bucket");

        let json = template.to_json().unwrap();
        let resource = &json["Resources"]["AssetsBucket"];
        assert_eq!(resource["DeletionPolicy"], "Delete");
        assert_eq!(
            resource["Properties"]["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]
                ["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
            "aws:kms"
        );
        assert_eq!(
            resource["Properties"]["PublicAccessBlockConfiguration"]["RestrictPublicBuckets"],
            true
        );
        assert!(resource["Properties"].get("VersioningConfiguration").is_none());
    }

    #[test]
    fn test_bucket_name_is_lowercased() {
        let mut template = Template::new();
        let config = AssetBucketConfig {
            name: Some("Media".to_string()),
            retain: Some(true),
        };
        let bucket = AssetBucket::build(&mut template, Environment::Dev, &config).unwrap();

        assert_eq!(bucket.bucket_name, "media-dev-bucket");
        assert_eq!(
            template.resource("MediaBucket").unwrap().deletion_policy,
            Some(DeletionPolicy::Retain)
        );
    }
}
