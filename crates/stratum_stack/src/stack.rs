//! Full stack composition: network, then load balancing, then scaling.

use stratum_core::{Exports, ResourceGraph};
use stratum_spec::{StackDocument, StackSpec};
use tracing::info;

use crate::autoscaling::{check_bounds, Placement, ScalingBuilder, ScalingInputs, ScalingOutputs};
use crate::error::StackResult;
use crate::load_balancer::{LoadBalancerBuilder, LoadBalancerOutputs};
use crate::network::{NetworkBuilder, NetworkOutputs};

/// Everything a declared stack exposes.
#[derive(Debug, Clone)]
pub struct StackOutputs {
    pub network: NetworkOutputs,
    pub load_balancer: LoadBalancerOutputs,
    pub scaling: ScalingOutputs,
    pub exports: Exports,
}

/// Declares a complete stack into a graph.
///
/// The load balancer spans the public subnets. Instances go to the private
/// subnets, or to the public ones when there are none.
pub struct StackBuilder<'a> {
    spec: &'a StackSpec,
    user_data: &'a [u8],
}

impl<'a> StackBuilder<'a> {
    pub fn new(spec: &'a StackSpec, user_data: &'a [u8]) -> Self {
        Self { spec, user_data }
    }

    pub fn from_document(document: &'a StackDocument) -> Self {
        Self::new(&document.spec, &document.user_data)
    }

    pub fn build(&self, graph: &mut ResourceGraph) -> StackResult<StackOutputs> {
        check_bounds(&self.spec.scaling)?;

        let network = NetworkBuilder::new(&self.spec.network).build(graph)?;

        let public_subnets = network.public_subnet_ids();
        let load_balancer = LoadBalancerBuilder::new(&self.spec.load_balancer).build(
            graph,
            &network.vpc_id,
            &public_subnets,
        )?;

        let private_subnets = network.private_subnet_ids();
        let instance_subnets = if private_subnets.is_empty() {
            public_subnets
        } else {
            private_subnets
        };
        let placement = Placement::choose(instance_subnets, &self.spec.scaling.azs)?;

        let scaling = ScalingBuilder::new(&self.spec.scaling, self.user_data).build(
            graph,
            ScalingInputs {
                vpc_id: network.vpc_id.clone(),
                placement,
                target_group_arn: load_balancer.target_group_arn.clone(),
                source_security_group_id: load_balancer.security_group_id.clone(),
            },
        )?;

        let exports = Self::exports(&network, &load_balancer, &scaling)?;
        info!("Declared stack: {} resources, {} exports", graph.len(), exports.len());

        Ok(StackOutputs {
            network,
            load_balancer,
            scaling,
            exports,
        })
    }

    fn exports(
        network: &NetworkOutputs,
        load_balancer: &LoadBalancerOutputs,
        scaling: &ScalingOutputs,
    ) -> StackResult<Exports> {
        let mut exports = Exports::new();

        exports.export("vpc-id", &network.vpc_id);
        exports.export("internet-gateway-id", &network.internet_gateway_id);
        if let Some(nat) = &network.nat_gateway_id {
            exports.export("nat-gateway-id", nat);
        }
        for subnet in &network.subnets {
            exports.export(subnet.export_key(), &subnet.id);
        }
        exports.export("public-subnet-ids", &network.public_subnet_list()?);
        exports.export("private-subnet-ids", &network.private_subnet_list()?);

        exports.export("alb-security-group-id", &load_balancer.security_group_id);
        exports.export("load-balancer-arn", &load_balancer.load_balancer_arn);
        exports.export("load-balancer-dns-name", &load_balancer.dns_name);
        exports.export("target-group-arn", &load_balancer.target_group_arn);

        exports.export("instance-security-group-id", &scaling.instance_security_group_id);
        exports.export("launch-template-id", &scaling.launch_template_id);
        exports.export("auto-scaling-group-name", &scaling.auto_scaling_group_name);

        Ok(exports)
    }
}
