//! Application load balancer in front of the scaling group.

use stratum_core::{Deferred, Input, Properties, ResourceGraph};
use stratum_provider::ResourceKind;
use stratum_spec::LoadBalancerSpec;
use tracing::info;

use crate::error::{StackError, StackResult};
use crate::network::{id_list, DEFAULT_ROUTE};

pub const ALB_SECURITY_GROUP: &str = "alb-security-group";
pub const LOAD_BALANCER: &str = "app-load-balancer";
pub const TARGET_GROUP: &str = "app-target-group";
pub const LISTENER: &str = "listener";

/// Deferred identifiers of the load-balancing tier.
#[derive(Debug, Clone)]
pub struct LoadBalancerOutputs {
    pub security_group_id: Deferred<String>,
    pub load_balancer_arn: Deferred<String>,
    pub dns_name: Deferred<String>,
    pub target_group_arn: Deferred<String>,
    pub listener_arn: Deferred<String>,
}

/// Declares the security group, load balancer, target group and listener.
pub struct LoadBalancerBuilder<'a> {
    spec: &'a LoadBalancerSpec,
}

impl<'a> LoadBalancerBuilder<'a> {
    pub fn new(spec: &'a LoadBalancerSpec) -> Self {
        Self { spec }
    }

    pub fn build(
        &self,
        graph: &mut ResourceGraph,
        vpc_id: &Deferred<String>,
        subnet_ids: &[Deferred<String>],
    ) -> StackResult<LoadBalancerOutputs> {
        if subnet_ids.is_empty() {
            return Err(StackError::EmptySubnets);
        }

        let port = self.spec.port;
        let target_port = self.spec.effective_target_port();
        info!(
            "Declaring load balancer on port {} over {} subnets (targets on {})",
            port,
            subnet_ids.len(),
            target_port
        );

        let security_group = graph.declare(
            ResourceKind::SecurityGroup,
            ALB_SECURITY_GROUP,
            Properties::new()
                .with("name", ALB_SECURITY_GROUP)
                .with("description", "Allow inbound traffic to the load balancer")
                .with("vpc_id", vpc_id)
                .with(
                    "ingress",
                    vec![Input::object([
                        ("description", Input::from("allow TCP")),
                        ("from_port", Input::from(port)),
                        ("to_port", Input::from(port)),
                        ("protocol", Input::from("tcp")),
                        ("cidr_blocks", Input::from(self.spec.allowed_cidrs.clone())),
                    ])],
                )
                .with(
                    "egress",
                    vec![Input::object([
                        ("from_port", Input::from(0u16)),
                        ("to_port", Input::from(0u16)),
                        ("protocol", Input::from("-1")),
                        ("cidr_blocks", Input::from(vec![DEFAULT_ROUTE])),
                    ])],
                ),
        )?;
        let security_group_id = security_group.id();

        let load_balancer = graph.declare_after(
            ResourceKind::LoadBalancer,
            LOAD_BALANCER,
            Properties::new()
                .with("load_balancer_type", "application")
                .with("internal", false)
                .with("security_groups", vec![Input::from(&security_group_id)])
                .with("subnets", id_list(subnet_ids)?),
            &[&security_group],
        )?;

        let target_group = graph.declare(
            ResourceKind::TargetGroup,
            TARGET_GROUP,
            Properties::new()
                .with("port", target_port)
                .with("protocol", "HTTP")
                .with("target_type", "instance")
                .with("vpc_id", vpc_id),
        )?;
        let target_group_arn = target_group.arn();

        let listener = graph.declare_after(
            ResourceKind::Listener,
            LISTENER,
            Properties::new()
                .with("load_balancer_arn", load_balancer.arn())
                .with("port", port)
                .with("protocol", "HTTP")
                .with(
                    "default_actions",
                    vec![Input::object([
                        ("type", Input::from("forward")),
                        ("target_group_arn", Input::from(&target_group_arn)),
                    ])],
                ),
            &[&target_group, &load_balancer],
        )?;

        Ok(LoadBalancerOutputs {
            security_group_id,
            load_balancer_arn: load_balancer.arn(),
            dns_name: load_balancer.attr_str("dns_name"),
            target_group_arn,
            listener_arn: listener.arn(),
        })
    }
}
