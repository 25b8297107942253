//! Data models for stack files.
//!
//! Field names follow snake_case; the hyphenated spellings (`ami-id`,
//! `min-size`, ...) are accepted as aliases so older stack files keep loading.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A complete stack: network, load balancer and scaling group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackSpec {
    pub network: NetworkSpec,
    #[serde(alias = "alb")]
    pub load_balancer: LoadBalancerSpec,
    #[serde(alias = "asg")]
    pub scaling: ScalingSpec,
}

/// VPC and its subnets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSpec {
    pub vpc: VpcSpec,
    /// Subnets in declaration order
    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,
}

impl NetworkSpec {
    pub fn new(vpc: VpcSpec) -> Self {
        Self {
            vpc,
            subnets: Vec::new(),
        }
    }

    pub fn with_subnet(mut self, subnet: SubnetSpec) -> Self {
        self.subnets.push(subnet);
        self
    }

    pub fn has_public_subnet(&self) -> bool {
        self.subnets.iter().any(|s| s.public)
    }

    pub fn has_private_subnet(&self) -> bool {
        self.subnets.iter().any(|s| !s.public)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VpcSpec {
    pub name: String,
    #[serde(alias = "cidr-block")]
    pub cidr_block: String,
}

impl VpcSpec {
    pub fn new(name: impl Into<String>, cidr_block: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cidr_block: cidr_block.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubnetSpec {
    /// Optional display name, used as the `Name` tag
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "cidr-block")]
    pub cidr_block: String,
    #[serde(alias = "availability_zone", alias = "availability-zone")]
    pub az: String,
    #[serde(default)]
    pub public: bool,
}

impl SubnetSpec {
    pub fn public(cidr_block: impl Into<String>, az: impl Into<String>) -> Self {
        Self {
            name: None,
            cidr_block: cidr_block.into(),
            az: az.into(),
            public: true,
        }
    }

    pub fn private(cidr_block: impl Into<String>, az: impl Into<String>) -> Self {
        Self {
            public: false,
            ..Self::public(cidr_block, az)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Application load balancer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerSpec {
    /// Listener port
    pub port: u16,
    /// Port the target group forwards to; defaults to the listener port
    #[serde(default, alias = "target-port")]
    pub target_port: Option<u16>,
    /// Source ranges allowed to reach the listener
    #[serde(default, alias = "allowed-cidrs")]
    pub allowed_cidrs: Vec<String>,
}

impl LoadBalancerSpec {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            target_port: None,
            allowed_cidrs: Vec::new(),
        }
    }

    pub fn with_target_port(mut self, port: u16) -> Self {
        self.target_port = Some(port);
        self
    }

    pub fn with_allowed_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.allowed_cidrs.push(cidr.into());
        self
    }

    pub fn effective_target_port(&self) -> u16 {
        self.target_port.unwrap_or(self.port)
    }
}

/// Auto scaling group and launch template settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalingSpec {
    pub name: String,
    #[serde(alias = "ami-id")]
    pub ami_id: String,
    #[serde(alias = "instance-type")]
    pub instance_type: String,
    #[serde(alias = "min-size")]
    pub min_size: u32,
    #[serde(alias = "max-size")]
    pub max_size: u32,
    #[serde(alias = "desired-capacity")]
    pub desired_capacity: u32,
    /// Instance ports opened to the load balancer
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Placement zones, used only when no subnets are available
    #[serde(default)]
    pub azs: Vec<String>,
    /// User-data script, relative to the stack file
    #[serde(default, alias = "user-data")]
    pub user_data: Option<PathBuf>,
    #[serde(default, alias = "iam-instance-profile")]
    pub iam_instance_profile: Option<String>,
}

impl ScalingSpec {
    pub fn new(
        name: impl Into<String>,
        ami_id: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ami_id: ami_id.into(),
            instance_type: instance_type.into(),
            min_size: 1,
            max_size: 1,
            desired_capacity: 1,
            ports: Vec::new(),
            azs: Vec::new(),
            user_data: None,
            iam_instance_profile: None,
        }
    }

    pub fn with_bounds(mut self, min_size: u32, max_size: u32, desired_capacity: u32) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self.desired_capacity = desired_capacity;
        self
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    pub fn with_azs(mut self, azs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.azs = azs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data = Some(path.into());
        self
    }

    pub fn with_iam_instance_profile(mut self, profile: impl Into<String>) -> Self {
        self.iam_instance_profile = Some(profile.into());
        self
    }

    pub fn bounds_are_ordered(&self) -> bool {
        self.min_size <= self.desired_capacity && self.desired_capacity <= self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyphenated_aliases() {
        let yaml = r#"
network:
  vpc:
    name: main-vpc
    cidr-block: 10.0.0.0/16
  subnets:
    - cidr_block: 10.0.1.0/24
      az: us-east-1a
      public: true
alb:
  port: 80
  allowed-cidrs: ["0.0.0.0/0"]
asg:
  name: web
  ami-id: ami-0abcdef1234567890
  instance-type: t3.micro
  min-size: 1
  max-size: 3
  desired-capacity: 2
  ports: [80]
"#;
        let spec: StackSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.network.vpc.cidr_block, "10.0.0.0/16");
        assert!(spec.network.subnets[0].public);
        assert_eq!(spec.load_balancer.allowed_cidrs, vec!["0.0.0.0/0"]);
        assert_eq!(spec.scaling.desired_capacity, 2);
        assert_eq!(spec.scaling.user_data, None);
    }

    #[test]
    fn test_subnet_defaults_to_private() {
        let subnet: SubnetSpec = serde_yaml::from_str("cidr_block: 10.0.2.0/24\naz: us-east-1b").unwrap();
        assert!(!subnet.public);
        assert_eq!(subnet, SubnetSpec::private("10.0.2.0/24", "us-east-1b"));
    }

    #[test]
    fn test_effective_target_port() {
        assert_eq!(LoadBalancerSpec::new(80).effective_target_port(), 80);
        assert_eq!(
            LoadBalancerSpec::new(443).with_target_port(8080).effective_target_port(),
            8080
        );
    }

    #[test]
    fn test_bounds() {
        let scaling = ScalingSpec::new("web", "ami-1", "t3.micro");
        assert!(scaling.clone().with_bounds(1, 3, 2).bounds_are_ordered());
        assert!(!scaling.clone().with_bounds(3, 1, 2).bounds_are_ordered());
        assert!(!scaling.with_bounds(1, 3, 4).bounds_are_ordered());
    }
}
