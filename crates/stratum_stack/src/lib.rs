//! # stratum_stack
//!
//! Builders that declare a multi-tier stack into a [`ResourceGraph`]:
//!
//! - **Network**: VPC, internet gateway, one Elastic IP and NAT gateway,
//!   public and private subnets with their route tables
//! - **Load balancing**: security group, application load balancer, target
//!   group and listener
//! - **Auto scaling**: instance security group with one ingress rule per
//!   port, launch template and scaling group
//!
//! Builders only declare. Nothing reaches a provider until the graph is
//! handed to an [`Orchestrator`](stratum_core::Orchestrator).
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratum_core::{Orchestrator, ResourceGraph};
//! use stratum_provider::MockProvider;
//! use stratum_spec::SpecReader;
//! use stratum_stack::StackBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let document = SpecReader::load("stack.yaml")?;
//! let mut graph = ResourceGraph::new();
//! let stack = StackBuilder::from_document(&document).build(&mut graph)?;
//!
//! Orchestrator::new(Arc::new(MockProvider::new())).realize(&graph).await?;
//! let outputs = stack.exports.resolve().await?;
//! println!("{}", outputs.get_str("load-balancer-dns-name").unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! [`ResourceGraph`]: stratum_core::ResourceGraph

pub mod autoscaling;
pub mod error;
pub mod load_balancer;
pub mod network;
pub mod stack;

pub use autoscaling::{Placement, ScalingBuilder, ScalingInputs, ScalingOutputs};
pub use error::{StackError, StackResult};
pub use load_balancer::{LoadBalancerBuilder, LoadBalancerOutputs};
pub use network::{NetworkBuilder, NetworkOutputs, SubnetOutput};
pub use stack::{StackBuilder, StackOutputs};
