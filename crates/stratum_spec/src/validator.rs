//! Stack validation utilities.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::cidr::Ipv4Cidr;
use crate::error::{SpecError, SpecResult};
use crate::models::{LoadBalancerSpec, NetworkSpec, ScalingSpec, StackSpec};

fn ami_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^ami-([0-9a-f]{8}|[0-9a-f]{17})$").expect("AMI id pattern is a valid regex")
    })
}

fn instance_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9-]*\.[a-z0-9]+$").expect("instance type pattern is a valid regex")
    })
}

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validator for stack files.
pub struct StackValidator;

impl StackValidator {
    /// Validate a whole stack.
    pub fn validate(spec: &StackSpec) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.merge(Self::validate_network(&spec.network));
        result.merge(Self::validate_load_balancer(&spec.load_balancer));
        result.merge(Self::validate_scaling(&spec.scaling, &spec.network));
        result
    }

    /// Validate and turn errors into [`SpecError::ValidationFailed`].
    pub fn ensure_valid(spec: &StackSpec) -> SpecResult<ValidationResult> {
        let result = Self::validate(spec);
        if !result.valid {
            return Err(SpecError::ValidationFailed(result.errors.join("; ")));
        }
        Ok(result)
    }

    /// Validate the VPC and its subnets.
    pub fn validate_network(network: &NetworkSpec) -> ValidationResult {
        let mut result = ValidationResult::new();

        if network.vpc.name.trim().is_empty() {
            result.add_error("VPC name cannot be empty");
        }

        let vpc = match network.vpc.cidr_block.parse::<Ipv4Cidr>() {
            Ok(cidr) => {
                if cidr.has_host_bits() {
                    result.add_warning(format!(
                        "VPC CIDR {} has host bits set; the network is {}/{}",
                        cidr,
                        cidr.network(),
                        cidr.prefix()
                    ));
                }
                Some(cidr)
            }
            Err(e) => {
                result.add_error(e.to_string());
                None
            }
        };

        if network.subnets.is_empty() {
            result.add_error("At least one subnet is required");
        }

        let mut parsed: Vec<(usize, Ipv4Cidr)> = Vec::new();
        for (index, subnet) in network.subnets.iter().enumerate() {
            if subnet.az.trim().is_empty() {
                result.add_error(format!("Subnet {} has an empty availability zone", index));
            }

            let cidr = match subnet.cidr_block.parse::<Ipv4Cidr>() {
                Ok(cidr) => cidr,
                Err(e) => {
                    result.add_error(format!("Subnet {}: {}", index, e));
                    continue;
                }
            };

            if let Some(vpc) = &vpc {
                if !vpc.contains(&cidr) {
                    result.add_error(format!(
                        "Subnet {} ({}) is outside the VPC CIDR {}",
                        index, cidr, vpc
                    ));
                }
            }

            for (other_index, other) in &parsed {
                if other.overlaps(&cidr) {
                    result.add_error(format!(
                        "Subnet {} ({}) overlaps subnet {} ({})",
                        index, cidr, other_index, other
                    ));
                }
            }
            parsed.push((index, cidr));
        }

        if network.has_private_subnet() && !network.has_public_subnet() {
            result.add_error("Private subnets need at least one public subnet to host the NAT gateway");
        }

        result
    }

    /// Validate listener settings.
    pub fn validate_load_balancer(lb: &LoadBalancerSpec) -> ValidationResult {
        let mut result = ValidationResult::new();

        if lb.port == 0 {
            result.add_error("Load balancer port must be between 1 and 65535");
        }
        if lb.target_port == Some(0) {
            result.add_error("Target port must be between 1 and 65535");
        }

        if lb.allowed_cidrs.is_empty() {
            result.add_error("At least one allowed CIDR is required for the load balancer");
        }
        for cidr in &lb.allowed_cidrs {
            if let Err(e) = cidr.parse::<Ipv4Cidr>() {
                result.add_error(format!("Allowed CIDR: {}", e));
            }
        }

        result
    }

    /// Validate the scaling group.
    pub fn validate_scaling(scaling: &ScalingSpec, network: &NetworkSpec) -> ValidationResult {
        let mut result = ValidationResult::new();

        if scaling.name.trim().is_empty() {
            result.add_error("Scaling group name cannot be empty");
        }

        if !scaling.bounds_are_ordered() {
            result.add_error(format!(
                "Scaling bounds must satisfy min <= desired <= max (min={}, desired={}, max={})",
                scaling.min_size, scaling.desired_capacity, scaling.max_size
            ));
        } else if scaling.max_size == 0 {
            result.add_warning("max_size is 0; no instances will be launched");
        }

        if scaling.ami_id.trim().is_empty() {
            result.add_error("AMI id cannot be empty");
        } else if !ami_pattern().is_match(&scaling.ami_id) {
            result.add_warning(format!("AMI id '{}' does not look like ami-xxxxxxxx", scaling.ami_id));
        }

        if scaling.instance_type.trim().is_empty() {
            result.add_error("Instance type cannot be empty");
        } else if !instance_type_pattern().is_match(&scaling.instance_type) {
            result.add_warning(format!(
                "Instance type '{}' does not look like family.size",
                scaling.instance_type
            ));
        }

        if scaling.ports.is_empty() {
            result.add_warning("No instance ports; the load balancer cannot reach the instances");
        }
        let mut seen = HashSet::new();
        for port in &scaling.ports {
            if *port == 0 {
                result.add_error("Instance port must be between 1 and 65535");
            } else if !seen.insert(*port) {
                result.add_error(format!("Instance port {} is listed more than once", port));
            }
        }

        if network.subnets.is_empty() && scaling.azs.is_empty() {
            result.add_error("Scaling group needs subnets or availability zones for placement");
        } else if !network.subnets.is_empty() && !scaling.azs.is_empty() {
            result.add_warning("azs are ignored when the network declares subnets");
        }

        if scaling.user_data.is_none() {
            result.add_warning("No user data configured; instances boot with the AMI defaults");
        }

        result
    }
}
