//! Pillar Infrastructure
//!
//! Synthesizes the Pillar deployment for one environment into a
//! CloudFormation template.
//!
//! This crate contains:
//! - Template model: resources, property values and intrinsic functions
//! - Constructs: VPC, bastion host, buckets, database cluster, compute
//!   cluster, container service and static website
//! - Pipeline: the Pipelineable contract and the manager that assembles
//!   build and deploy stages from registered units
//! - Stack: the composition root wiring everything together

pub mod buildspec;
pub mod cidr;
pub mod constructs;
pub mod environment;
pub mod error;
pub mod pipeline;
pub mod stack;
pub mod template;

pub use environment::Environment;
pub use error::{InfraError, Result};
pub use stack::{PillarStack, StackConfig};
pub use template::Template;
