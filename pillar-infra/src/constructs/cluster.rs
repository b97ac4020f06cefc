//! ECS compute cluster shared by the services of one environment

use crate::constructs::tags;
use crate::constructs::vpc::PillarVpc;
use crate::environment::Environment;
use crate::error::Result;
use crate::template::{Resource, Template, Value, logical_id};

/// Handle passed to every service that runs on the cluster
#[derive(Debug, Clone)]
pub struct ComputeCluster {
    pub logical_id: String,
    pub cluster_name: String,
    pub namespace_id: String,
}

impl ComputeCluster {
    /// Cluster with container insights and a private service discovery
    /// namespace named `<name>.<environment>.local`
    pub fn build(
        template: &mut Template,
        vpc: &PillarVpc,
        name: &str,
        environment: Environment,
    ) -> Result<Self> {
        let cluster_name = format!("{}-{}", name, environment);
        let id = logical_id(&[name, "cluster"]);
        let description = format!("Compute cluster for {}", environment);

        template.add_resource(
            Resource::new(&id, "AWS::ECS::Cluster")
                .with_property("ClusterName", cluster_name.as_str())
                .with_property(
                    "ClusterSettings",
                    Value::list([Value::map([
                        ("Name", Value::str("containerInsights")),
                        ("Value", Value::str("enabled")),
                    ])]),
                )
                .with_property("Tags", tags(name, environment, &description)),
        )?;

        let namespace_id = logical_id(&[name, "namespace"]);
        template.add_resource(
            Resource::new(&namespace_id, "AWS::ServiceDiscovery::PrivateDnsNamespace")
                .with_property("Name", format!("{}.{}.local", name, environment))
                .with_property("Vpc", vpc.vpc_id())
                .with_property("Tags", tags(name, environment, &description)),
        )?;

        Ok(Self {
            logical_id: id,
            cluster_name,
            namespace_id,
        })
    }

    pub fn reference(&self) -> Value {
        Value::reference(&self.logical_id)
    }

    pub fn arn(&self) -> Value {
        Value::get_att(&self.logical_id, "Arn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructs::vpc::VpcConfig;

    #[test]
    fn test_cluster_enables_container_insights() {
        let mut template = Template::new();
        let vpc = PillarVpc::build(&mut template, "vpc", Environment::Dev, &VpcConfig::default())
            .unwrap();
        let cluster = ComputeCluster::build(&mut template, &vpc, "pillar", Environment::Dev).unwrap();

        assert_eq!(cluster.cluster_name, "pillar-dev");

        let json = template.to_json().unwrap();
        let props = &json["Resources"]["PillarCluster"]["Properties"];
        assert_eq!(props["ClusterSettings"][0]["Name"], "containerInsights");
        assert_eq!(
            json["Resources"]["PillarNamespace"]["Properties"]["Name"],
            "pillar.dev.local"
        );
    }
}
