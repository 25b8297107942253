//! Auto scaling group, launch template and instance security group.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use stratum_core::{Deferred, Input, Properties, ResourceGraph};
use stratum_provider::ResourceKind;
use stratum_spec::ScalingSpec;
use tracing::info;

use crate::error::{StackError, StackResult};
use crate::network::id_list;

pub const INSTANCE_SECURITY_GROUP: &str = "instance-security-group";
pub const LAUNCH_TEMPLATE: &str = "launch-template";
pub const AUTO_SCALING_GROUP: &str = "auto-scaling-group";

/// Launch template version the group always follows.
pub const LATEST_VERSION: &str = "$Latest";

pub fn ingress_rule_name(port: u16) -> String {
    format!("ingress-rule-{}", port)
}

/// Reject bounds that violate `min <= desired <= max`.
pub fn check_bounds(spec: &ScalingSpec) -> StackResult<()> {
    if spec.bounds_are_ordered() {
        return Ok(());
    }
    Err(StackError::InvalidScalingBounds {
        min: spec.min_size,
        max: spec.max_size,
        desired: spec.desired_capacity,
    })
}

/// Where instances are launched.
#[derive(Debug, Clone)]
pub enum Placement {
    Subnets(Vec<Deferred<String>>),
    Zones(Vec<String>),
}

impl Placement {
    /// Subnets when there are any, explicit zones otherwise.
    pub fn choose(subnet_ids: Vec<Deferred<String>>, zones: &[String]) -> StackResult<Self> {
        if !subnet_ids.is_empty() {
            Ok(Placement::Subnets(subnet_ids))
        } else if !zones.is_empty() {
            Ok(Placement::Zones(zones.to_vec()))
        } else {
            Err(StackError::EmptyPlacement)
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Placement::Subnets(ids) => ids.is_empty(),
            Placement::Zones(zones) => zones.is_empty(),
        }
    }
}

/// Upstream values the scaling tier is wired to.
#[derive(Debug, Clone)]
pub struct ScalingInputs {
    pub vpc_id: Deferred<String>,
    pub placement: Placement,
    pub target_group_arn: Deferred<String>,
    /// Security group of the load balancer; the only allowed ingress source
    pub source_security_group_id: Deferred<String>,
}

/// Deferred identifiers of the scaling tier.
#[derive(Debug, Clone)]
pub struct ScalingOutputs {
    pub instance_security_group_id: Deferred<String>,
    pub launch_template_id: Deferred<String>,
    pub auto_scaling_group_name: Deferred<String>,
    pub auto_scaling_group_arn: Deferred<String>,
}

/// Declares the scaling tier.
pub struct ScalingBuilder<'a> {
    spec: &'a ScalingSpec,
    user_data: &'a [u8],
}

impl<'a> ScalingBuilder<'a> {
    pub fn new(spec: &'a ScalingSpec, user_data: &'a [u8]) -> Self {
        Self { spec, user_data }
    }

    /// Bounds and placement are checked before anything is declared.
    pub fn build(&self, graph: &mut ResourceGraph, inputs: ScalingInputs) -> StackResult<ScalingOutputs> {
        check_bounds(self.spec)?;
        if inputs.placement.is_empty() {
            return Err(StackError::EmptyPlacement);
        }

        info!(
            "Declaring scaling group '{}' ({}..{}, desired {}) with {} ingress ports",
            self.spec.name,
            self.spec.min_size,
            self.spec.max_size,
            self.spec.desired_capacity,
            self.spec.ports.len()
        );

        let security_group = graph.declare(
            ResourceKind::SecurityGroup,
            INSTANCE_SECURITY_GROUP,
            Properties::new()
                .with("name", format!("{}-instances", self.spec.name))
                .with("description", "Security group for the instances")
                .with("vpc_id", &inputs.vpc_id),
        )?;
        let instance_security_group_id = security_group.id();

        for port in &self.spec.ports {
            graph.declare(
                ResourceKind::SecurityGroupRule,
                ingress_rule_name(*port),
                Properties::new()
                    .with("type", "ingress")
                    .with("security_group_id", &instance_security_group_id)
                    .with("from_port", *port)
                    .with("to_port", *port)
                    .with("protocol", "tcp")
                    .with("source_security_group_id", &inputs.source_security_group_id),
            )?;
        }

        let user_data = (!self.user_data.is_empty()).then(|| STANDARD.encode(self.user_data));
        let instance_profile = self
            .spec
            .iam_instance_profile
            .as_deref()
            .map(|name| Input::object([("name", name)]));

        let launch_template = graph.declare_after(
            ResourceKind::LaunchTemplate,
            LAUNCH_TEMPLATE,
            Properties::new()
                .with("name_prefix", self.spec.name.as_str())
                .with("image_id", self.spec.ami_id.as_str())
                .with("instance_type", self.spec.instance_type.as_str())
                .with("vpc_security_group_ids", vec![Input::from(&instance_security_group_id)])
                .with_opt("user_data", user_data)
                .with_opt("iam_instance_profile", instance_profile),
            &[&security_group],
        )?;
        let launch_template_id = launch_template.id();

        let mut properties = Properties::new()
            .with("name", self.spec.name.as_str())
            .with("min_size", self.spec.min_size)
            .with("max_size", self.spec.max_size)
            .with("desired_capacity", self.spec.desired_capacity)
            .with(
                "launch_template",
                Input::object([
                    ("id", Input::from(&launch_template_id)),
                    ("version", Input::from(LATEST_VERSION)),
                ]),
            )
            .with("target_group_arns", vec![Input::from(&inputs.target_group_arn)]);

        match &inputs.placement {
            Placement::Subnets(ids) => properties.set("vpc_zone_identifiers", id_list(ids)?),
            Placement::Zones(zones) => properties.set("availability_zones", zones.clone()),
        }

        let group = graph.declare_after(
            ResourceKind::AutoScalingGroup,
            AUTO_SCALING_GROUP,
            properties,
            &[&launch_template],
        )?;

        Ok(ScalingOutputs {
            instance_security_group_id,
            launch_template_id,
            auto_scaling_group_name: group.attr_str("name"),
            auto_scaling_group_arn: group.arn(),
        })
    }
}
