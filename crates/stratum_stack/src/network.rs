//! Network topology: VPC, subnets, gateways and routing.
//!
//! Public subnets route `0.0.0.0/0` to the internet gateway. A single NAT
//! gateway lives in the first declared public subnet, and every private
//! subnet routes through it.

use stratum_core::{Deferred, Input, Properties, ResourceGraph};
use stratum_provider::ResourceKind;
use stratum_spec::{NetworkSpec, SubnetSpec};
use tracing::{debug, info};

use crate::error::{StackError, StackResult};

/// Destination of every default route.
pub const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// Name of the single NAT gateway.
pub const NAT_GATEWAY: &str = "nat-gateway";

pub(crate) fn tier(public: bool) -> &'static str {
    if public {
        "public"
    } else {
        "private"
    }
}

pub(crate) fn name_tag(name: &str) -> Input {
    Input::object([("Name", name)])
}

/// Gather subnet ids into one list value.
pub(crate) fn id_list(ids: &[Deferred<String>]) -> StackResult<Deferred<Vec<String>>> {
    if ids.is_empty() {
        return Ok(Deferred::ready(Vec::new()));
    }
    Ok(Deferred::combine(ids.iter().cloned())?)
}

/// One declared subnet.
#[derive(Debug, Clone)]
pub struct SubnetOutput {
    /// Position in the configured subnet list
    pub index: usize,
    pub public: bool,
    pub id: Deferred<String>,
}

impl SubnetOutput {
    /// `public-subnet-0`, `private-subnet-3`, ...
    pub fn export_key(&self) -> String {
        format!("{}-subnet-{}", tier(self.public), self.index)
    }
}

/// Deferred identifiers of the declared network.
#[derive(Debug, Clone)]
pub struct NetworkOutputs {
    pub vpc_id: Deferred<String>,
    pub internet_gateway_id: Deferred<String>,
    pub elastic_ip_id: Deferred<String>,
    /// Present when at least one public subnet exists
    pub nat_gateway_id: Option<Deferred<String>>,
    /// In configured order
    pub subnets: Vec<SubnetOutput>,
}

impl NetworkOutputs {
    pub fn public_subnet_ids(&self) -> Vec<Deferred<String>> {
        self.subnets
            .iter()
            .filter(|s| s.public)
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn private_subnet_ids(&self) -> Vec<Deferred<String>> {
        self.subnets
            .iter()
            .filter(|s| !s.public)
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn public_subnet_list(&self) -> StackResult<Deferred<Vec<String>>> {
        id_list(&self.public_subnet_ids())
    }

    pub fn private_subnet_list(&self) -> StackResult<Deferred<Vec<String>>> {
        id_list(&self.private_subnet_ids())
    }
}

/// Declares the network subgraph.
pub struct NetworkBuilder<'a> {
    spec: &'a NetworkSpec,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(spec: &'a NetworkSpec) -> Self {
        Self { spec }
    }

    /// Fails before declaring anything when private subnets exist without a public one.
    pub fn build(&self, graph: &mut ResourceGraph) -> StackResult<NetworkOutputs> {
        if self.spec.has_private_subnet() && !self.spec.has_public_subnet() {
            return Err(StackError::MissingPublicSubnet);
        }

        info!(
            "Declaring network '{}' ({}, {} subnets)",
            self.spec.vpc.name,
            self.spec.vpc.cidr_block,
            self.spec.subnets.len()
        );

        let vpc = graph.declare(
            ResourceKind::Vpc,
            self.spec.vpc.name.as_str(),
            Properties::new()
                .with("cidr_block", self.spec.vpc.cidr_block.as_str())
                .with("enable_dns_support", true)
                .with("enable_dns_hostnames", true)
                .with("tags", name_tag(&self.spec.vpc.name)),
        )?;
        let vpc_id = vpc.id();

        let igw = graph.declare(
            ResourceKind::InternetGateway,
            "internet-gateway",
            Properties::new().with("vpc_id", &vpc_id),
        )?;
        let internet_gateway_id = igw.id();

        // Allocated up front; only the NAT gateway consumes it.
        let eip = graph.declare(
            ResourceKind::ElasticIp,
            "elastic-ip",
            Properties::new().with("domain", "vpc"),
        )?;
        let elastic_ip_id = eip.id();

        let (public, private): (Vec<(usize, &SubnetSpec)>, Vec<(usize, &SubnetSpec)>) =
            self.spec.subnets.iter().enumerate().partition(|(_, s)| s.public);

        let mut nat_gateway_id: Option<Deferred<String>> = None;
        let mut subnets = Vec::with_capacity(self.spec.subnets.len());

        for (index, subnet) in public.into_iter().chain(private) {
            let tier = tier(subnet.public);
            let name = format!("{}-subnet-{}", tier, index);
            debug!("Declaring {} in {}", name, subnet.az);

            let resource = graph.declare(
                ResourceKind::Subnet,
                name.as_str(),
                Properties::new()
                    .with("vpc_id", &vpc_id)
                    .with("cidr_block", subnet.cidr_block.as_str())
                    .with("availability_zone", subnet.az.as_str())
                    .with("map_public_ip_on_launch", subnet.public)
                    .with("tags", name_tag(subnet.name.as_deref().unwrap_or(&name))),
            )?;
            let subnet_id = resource.id();

            let route = if subnet.public {
                if nat_gateway_id.is_none() {
                    let nat = graph.declare_after(
                        ResourceKind::NatGateway,
                        NAT_GATEWAY,
                        Properties::new()
                            .with("allocation_id", &elastic_ip_id)
                            .with("subnet_id", &subnet_id)
                            .with("connectivity_type", "public"),
                        &[&igw],
                    )?;
                    nat_gateway_id = Some(nat.id());
                }
                Input::object([
                    ("cidr_block", Input::from(DEFAULT_ROUTE)),
                    ("gateway_id", Input::from(&internet_gateway_id)),
                ])
            } else {
                let Some(nat) = &nat_gateway_id else {
                    return Err(StackError::MissingPublicSubnet);
                };
                Input::object([
                    ("cidr_block", Input::from(DEFAULT_ROUTE)),
                    ("nat_gateway_id", Input::from(nat)),
                ])
            };

            let table = graph.declare(
                ResourceKind::RouteTable,
                format!("{}-subnet-rt-{}", tier, index),
                Properties::new()
                    .with("vpc_id", &vpc_id)
                    .with("routes", vec![route]),
            )?;

            graph.declare(
                ResourceKind::RouteTableAssociation,
                format!("{}-subnet-association-{}", tier, index),
                Properties::new()
                    .with("subnet_id", &subnet_id)
                    .with("route_table_id", table.id()),
            )?;

            subnets.push(SubnetOutput {
                index,
                public: subnet.public,
                id: subnet_id,
            });
        }

        subnets.sort_by_key(|s| s.index);

        Ok(NetworkOutputs {
            vpc_id,
            internet_gateway_id,
            elastic_ip_id,
            nat_gateway_id,
            subnets,
        })
    }
}
