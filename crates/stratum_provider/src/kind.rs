//! Resource kinds understood by a provisioning provider.

use serde::{Deserialize, Serialize};

/// The kinds of cloud object the engine knows how to declare.
///
/// Each kind maps to exactly one abstract provider operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    InternetGateway,
    ElasticIp,
    NatGateway,
    RouteTable,
    RouteTableAssociation,
    SecurityGroup,
    SecurityGroupRule,
    LoadBalancer,
    TargetGroup,
    Listener,
    LaunchTemplate,
    AutoScalingGroup,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::InternetGateway => "internet_gateway",
            ResourceKind::ElasticIp => "elastic_ip",
            ResourceKind::NatGateway => "nat_gateway",
            ResourceKind::RouteTable => "route_table",
            ResourceKind::RouteTableAssociation => "route_table_association",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::SecurityGroupRule => "security_group_rule",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::TargetGroup => "target_group",
            ResourceKind::Listener => "listener",
            ResourceKind::LaunchTemplate => "launch_template",
            ResourceKind::AutoScalingGroup => "auto_scaling_group",
        }
    }

    /// Name of the provider operation that creates this kind.
    pub fn operation(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "createVPC",
            ResourceKind::Subnet => "createSubnet",
            ResourceKind::InternetGateway => "createInternetGateway",
            ResourceKind::ElasticIp => "createElasticIP",
            ResourceKind::NatGateway => "createNatGateway",
            ResourceKind::RouteTable => "createRouteTable",
            ResourceKind::RouteTableAssociation => "associateRouteTable",
            ResourceKind::SecurityGroup => "createSecurityGroup",
            ResourceKind::SecurityGroupRule => "createSecurityGroupRule",
            ResourceKind::LoadBalancer => "createLoadBalancer",
            ResourceKind::TargetGroup => "createTargetGroup",
            ResourceKind::Listener => "createListener",
            ResourceKind::LaunchTemplate => "createLaunchTemplate",
            ResourceKind::AutoScalingGroup => "createAutoScalingGroup",
        }
    }

    /// Prefix used for provider-assigned identifiers.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::InternetGateway => "igw",
            ResourceKind::ElasticIp => "eipalloc",
            ResourceKind::NatGateway => "nat",
            ResourceKind::RouteTable => "rtb",
            ResourceKind::RouteTableAssociation => "rtbassoc",
            ResourceKind::SecurityGroup => "sg",
            ResourceKind::SecurityGroupRule => "sgr",
            ResourceKind::LoadBalancer => "app",
            ResourceKind::TargetGroup => "targetgroup",
            ResourceKind::Listener => "listener",
            ResourceKind::LaunchTemplate => "lt",
            ResourceKind::AutoScalingGroup => "asg",
        }
    }

    /// Whether the created object is addressed by an ARN in addition to its id.
    pub fn has_arn(&self) -> bool {
        matches!(
            self,
            ResourceKind::LoadBalancer
                | ResourceKind::TargetGroup
                | ResourceKind::Listener
                | ResourceKind::AutoScalingGroup
        )
    }

    pub fn all() -> Vec<Self> {
        vec![
            ResourceKind::Vpc,
            ResourceKind::Subnet,
            ResourceKind::InternetGateway,
            ResourceKind::ElasticIp,
            ResourceKind::NatGateway,
            ResourceKind::RouteTable,
            ResourceKind::RouteTableAssociation,
            ResourceKind::SecurityGroup,
            ResourceKind::SecurityGroupRule,
            ResourceKind::LoadBalancer,
            ResourceKind::TargetGroup,
            ResourceKind::Listener,
            ResourceKind::LaunchTemplate,
            ResourceKind::AutoScalingGroup,
        ]
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_operations_are_unique() {
        let operations: HashSet<_> = ResourceKind::all().iter().map(|k| k.operation()).collect();
        assert_eq!(operations.len(), 14);
        assert!(operations.contains("associateRouteTable"));
    }

    #[test]
    fn test_arn_kinds() {
        assert!(ResourceKind::TargetGroup.has_arn());
        assert!(!ResourceKind::Vpc.has_arn());
    }
}
