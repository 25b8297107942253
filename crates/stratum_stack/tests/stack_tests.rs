//! Integration tests for stack construction and realization.
//!
//! Stacks are realized against the simulated provider, whose captured
//! requests carry the fully resolved properties of every resource.

use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::tempdir;

use stratum_core::{CoreError, Orchestrator, ResourceGraph};
use stratum_provider::{MockProvider, ResourceKind};
use stratum_spec::{
    LoadBalancerSpec, NetworkSpec, ScalingSpec, SpecReader, StackSpec, SubnetSpec, VpcSpec,
};
use stratum_stack::{NetworkBuilder, StackBuilder, StackError, StackOutputs};

fn network(layout: &str) -> NetworkSpec {
    let subnets = layout
        .chars()
        .enumerate()
        .map(|(i, tier)| {
            let cidr = format!("10.0.{}.0/24", i + 1);
            let az = if i % 2 == 0 { "us-east-1a" } else { "us-east-1b" };
            match tier {
                'P' => SubnetSpec::public(cidr, az),
                _ => SubnetSpec::private(cidr, az),
            }
        })
        .collect();
    NetworkSpec {
        vpc: VpcSpec::new("main-vpc", "10.0.0.0/16"),
        subnets,
    }
}

fn stack(layout: &str) -> StackSpec {
    StackSpec {
        network: network(layout),
        load_balancer: LoadBalancerSpec::new(80).with_allowed_cidr("0.0.0.0/0"),
        scaling: ScalingSpec::new("web-asg", "ami-0abcdef1234567890", "t3.micro")
            .with_bounds(1, 4, 2)
            .with_ports([80]),
    }
}

async fn realize(spec: &StackSpec, provider: &MockProvider) -> StackOutputs {
    let mut graph = ResourceGraph::new();
    let outputs = StackBuilder::new(spec, b"#!/bin/sh\n").build(&mut graph).unwrap();
    Orchestrator::new(Arc::new(provider.clone()))
        .realize(&graph)
        .await
        .unwrap();
    outputs
}

fn id_of(provider: &MockProvider, kind: ResourceKind, name: &str) -> Value {
    provider.attributes_of(kind, name).unwrap()["id"].clone()
}

fn property(provider: &MockProvider, name: &str, key: &str) -> Value {
    provider
        .request_for(name)
        .and_then(|r| r.get(key).cloned())
        .unwrap_or(Value::Null)
}

/// One public and one private subnet: one of each shared network resource.
#[tokio::test]
async fn test_two_tier_network_scenario() {
    let provider = MockProvider::new();
    let outputs = realize(&stack("PR"), &provider).await;

    for (kind, count) in [
        (ResourceKind::Vpc, 1),
        (ResourceKind::InternetGateway, 1),
        (ResourceKind::ElasticIp, 1),
        (ResourceKind::NatGateway, 1),
        (ResourceKind::RouteTable, 2),
        (ResourceKind::RouteTableAssociation, 2),
    ] {
        assert_eq!(provider.requests_of(kind).len(), count, "{}", kind);
    }

    assert_eq!(property(&provider, "public-subnet-0", "availability_zone"), json!("us-east-1a"));
    assert_eq!(
        property(&provider, "nat-gateway", "subnet_id"),
        id_of(&provider, ResourceKind::Subnet, "public-subnet-0")
    );
    assert_eq!(
        property(&provider, "nat-gateway", "allocation_id"),
        id_of(&provider, ResourceKind::ElasticIp, "elastic-ip")
    );

    let exported = outputs.exports.resolve().await.unwrap();
    assert_eq!(exported.get("public-subnet-ids").unwrap().as_array().unwrap().len(), 1);
    assert_eq!(exported.get("private-subnet-ids").unwrap().as_array().unwrap().len(), 1);
}

/// Every private route table points at the single NAT gateway.
#[tokio::test]
async fn test_nat_gateway_is_shared_by_all_private_subnets() {
    for layout in ["PR", "RP", "PPR", "RRP", "PRPR", "RRRP", "PRRRR"] {
        let provider = MockProvider::new();
        let mut graph = ResourceGraph::new();
        NetworkBuilder::new(&network(layout)).build(&mut graph).unwrap();
        Orchestrator::new(Arc::new(provider.clone()))
            .realize(&graph)
            .await
            .unwrap();

        assert_eq!(provider.requests_of(ResourceKind::NatGateway).len(), 1, "{}", layout);
        let nat_id = id_of(&provider, ResourceKind::NatGateway, "nat-gateway");

        for (index, tier) in layout.chars().enumerate() {
            if tier != 'R' {
                continue;
            }
            let routes = property(&provider, &format!("private-subnet-rt-{}", index), "routes");
            assert_eq!(routes[0]["nat_gateway_id"], nat_id, "{} subnet {}", layout, index);
            assert_eq!(routes[0]["cidr_block"], json!("0.0.0.0/0"));
            assert!(routes[0].get("gateway_id").is_none());
        }
    }
}

/// Public route tables route to the internet gateway, never the NAT gateway.
#[tokio::test]
async fn test_public_routes_target_internet_gateway() {
    let provider = MockProvider::new();
    realize(&stack("RPRP"), &provider).await;

    let igw_id = id_of(&provider, ResourceKind::InternetGateway, "internet-gateway");
    for index in [1, 3] {
        let routes = property(&provider, &format!("public-subnet-rt-{}", index), "routes");
        assert_eq!(routes.as_array().unwrap().len(), 1);
        assert_eq!(routes[0]["gateway_id"], igw_id);
        assert!(routes[0].get("nat_gateway_id").is_none());
    }

    // NAT lives in the first declared public subnet.
    assert_eq!(
        property(&provider, "nat-gateway", "subnet_id"),
        id_of(&provider, ResourceKind::Subnet, "public-subnet-1")
    );
}

/// The same configuration always yields the same graph.
#[test]
fn test_construction_is_deterministic() {
    let spec = stack("PRPR");
    let shapes: Vec<_> = (0..2)
        .map(|_| {
            let mut graph = ResourceGraph::new();
            StackBuilder::new(&spec, b"").build(&mut graph).unwrap();
            graph.shape()
        })
        .collect();

    assert_eq!(shapes[0], shapes[1]);
    assert!(!shapes[0].edges.is_empty());
}

/// Invalid bounds stop construction before anything is declared.
#[test]
fn test_invalid_bounds_declare_nothing() {
    let mut spec = stack("PR");
    spec.scaling = spec.scaling.with_bounds(5, 3, 4);

    let mut graph = ResourceGraph::new();
    let result = StackBuilder::new(&spec, b"").build(&mut graph);

    assert!(matches!(
        result,
        Err(StackError::InvalidScalingBounds { min: 5, max: 3, desired: 4 })
    ));
    assert!(graph.is_empty());
}

/// Instance ingress is only ever sourced from the load balancer's group.
#[tokio::test]
async fn test_ingress_rules_sourced_from_alb_group() {
    let mut spec = stack("PR");
    spec.scaling = spec.scaling.with_ports([80, 443, 8080]);
    let provider = MockProvider::new();
    realize(&spec, &provider).await;

    let alb_group = id_of(&provider, ResourceKind::SecurityGroup, "alb-security-group");
    let instance_group = id_of(&provider, ResourceKind::SecurityGroup, "instance-security-group");
    let rules = provider.requests_of(ResourceKind::SecurityGroupRule);
    assert_eq!(rules.len(), 3);

    for rule in rules {
        assert_eq!(rule.get("source_security_group_id"), Some(&alb_group));
        assert_eq!(rule.get("security_group_id"), Some(&instance_group));
        assert!(rule.get("cidr_blocks").is_none());
        assert_eq!(rule.get("from_port"), rule.get("to_port"));
    }
}

/// Listener on port 80 from anywhere, over two subnets.
#[tokio::test]
async fn test_load_balancer_scenario() {
    let provider = MockProvider::new();
    realize(&stack("PP"), &provider).await;

    let groups = provider.requests_of(ResourceKind::SecurityGroup);
    let alb_group = groups.iter().find(|r| r.name == "alb-security-group").unwrap();
    assert_eq!(
        alb_group.get("ingress"),
        Some(&json!([{
            "description": "allow TCP",
            "from_port": 80,
            "to_port": 80,
            "protocol": "tcp",
            "cidr_blocks": ["0.0.0.0/0"]
        }]))
    );
    assert_eq!(
        alb_group.get("egress"),
        Some(&json!([{
            "from_port": 0,
            "to_port": 0,
            "protocol": "-1",
            "cidr_blocks": ["0.0.0.0/0"]
        }]))
    );

    assert_eq!(property(&provider, "app-load-balancer", "subnets").as_array().unwrap().len(), 2);

    let listeners = provider.requests_of(ResourceKind::Listener);
    assert_eq!(listeners.len(), 1);
    let target_group_arn = provider
        .attributes_of(ResourceKind::TargetGroup, "app-target-group")
        .unwrap()["arn"]
        .clone();
    assert_eq!(listeners[0].get("port"), Some(&json!(80)));
    assert_eq!(
        listeners[0].get("default_actions"),
        Some(&json!([{ "type": "forward", "target_group_arn": target_group_arn }]))
    );
    assert_eq!(
        property(&provider, "listener", "load_balancer_arn"),
        provider.attributes_of(ResourceKind::LoadBalancer, "app-load-balancer").unwrap()["arn"]
    );
}

/// Instances prefer private subnets and follow the latest template.
#[tokio::test]
async fn test_scaling_group_wiring() {
    let provider = MockProvider::new();
    realize(&stack("PRR"), &provider).await;

    let identifiers = property(&provider, "auto-scaling-group", "vpc_zone_identifiers");
    assert_eq!(
        identifiers,
        json!([
            id_of(&provider, ResourceKind::Subnet, "private-subnet-1"),
            id_of(&provider, ResourceKind::Subnet, "private-subnet-2")
        ])
    );
    assert_eq!(
        property(&provider, "auto-scaling-group", "launch_template"),
        json!({
            "id": id_of(&provider, ResourceKind::LaunchTemplate, "launch-template"),
            "version": "$Latest"
        })
    );
    assert_eq!(property(&provider, "auto-scaling-group", "min_size"), json!(1));
    assert_eq!(property(&provider, "auto-scaling-group", "max_size"), json!(4));
    assert_eq!(property(&provider, "auto-scaling-group", "desired_capacity"), json!(2));
    assert_eq!(property(&provider, "launch-template", "user_data"), json!("IyEvYmluL3NoCg=="));
}

/// A second run of the same stack converges on the same objects.
#[tokio::test]
async fn test_repeated_run_is_idempotent() {
    let spec = stack("PR");
    let provider = MockProvider::new();

    let first = realize(&spec, &provider).await.exports.resolve().await.unwrap();
    let created = provider.created_names();
    provider.clear_calls();

    let second = realize(&spec, &provider).await.exports.resolve().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.created_names(), created);
    assert!(provider.get_calls().iter().all(|call| call.reused));
}

/// All documented export keys are present and resolved.
#[tokio::test]
async fn test_exports() {
    let provider = MockProvider::new();
    let outputs = realize(&stack("PR"), &provider).await;
    let exported = outputs.exports.resolve().await.unwrap();

    for key in [
        "vpc-id",
        "internet-gateway-id",
        "nat-gateway-id",
        "public-subnet-0",
        "private-subnet-1",
        "public-subnet-ids",
        "private-subnet-ids",
        "alb-security-group-id",
        "load-balancer-arn",
        "load-balancer-dns-name",
        "target-group-arn",
        "instance-security-group-id",
        "launch-template-id",
        "auto-scaling-group-name",
    ] {
        assert!(exported.get(key).is_some(), "missing export {}", key);
    }

    assert_eq!(exported.get_str("auto-scaling-group-name"), Some("web-asg"));
    assert!(exported.get_str("vpc-id").unwrap().starts_with("vpc-"));
    assert!(exported
        .get_str("load-balancer-dns-name")
        .unwrap()
        .ends_with(".elb.amazonaws.com"));
}

/// A failed NAT gateway blocks private routing and its exports.
#[tokio::test]
async fn test_failure_leaves_dependent_exports_unresolved() {
    let provider = MockProvider::new().fail_on("nat-gateway", "NatGatewayLimitExceeded");
    let mut graph = ResourceGraph::new();
    let outputs = StackBuilder::new(&stack("PR"), b"").build(&mut graph).unwrap();

    let err = Orchestrator::new(Arc::new(provider.clone()))
        .realize(&graph)
        .await
        .unwrap_err();

    let failure = match err {
        CoreError::PartialFailure(failure) => failure,
        other => panic!("expected partial failure, got {:?}", other),
    };
    assert_eq!(failure.failed.name, "nat-gateway");
    assert!(failure.unresolved_names().contains(&"private-subnet-rt-1"));
    assert!(failure.unresolved_names().contains(&"private-subnet-association-1"));
    assert!(!failure.completed_names().contains(&"nat-gateway"));

    let available = outputs.exports.resolved();
    assert!(available.get("vpc-id").is_some());
    assert!(available.get("nat-gateway-id").is_none());
    assert!(matches!(
        outputs.exports.resolve().await,
        Err(CoreError::UnresolvedExport { .. })
    ));
}

/// End to end from a stack file on disk.
#[tokio::test]
async fn test_stack_from_file() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("boot.sh"), "#!/bin/sh\n").unwrap();
    let path = temp.path().join("stack.yaml");
    fs::write(
        &path,
        r#"
network:
  vpc: { name: edge-vpc, cidr_block: 10.1.0.0/16 }
  subnets:
    - { cidr_block: 10.1.1.0/24, az: eu-west-1a, public: true }
alb:
  port: 8080
  allowed-cidrs: ["10.0.0.0/8"]
asg:
  name: edge
  ami-id: ami-12345678
  instance-type: t3.small
  min-size: 1
  max-size: 1
  desired-capacity: 1
  ports: [8080]
  user-data: boot.sh
"#,
    )
    .unwrap();

    let document = SpecReader::load(&path).unwrap();
    let provider = MockProvider::new();
    let mut graph = ResourceGraph::new();
    let outputs = StackBuilder::from_document(&document).build(&mut graph).unwrap();
    Orchestrator::new(Arc::new(provider.clone()))
        .realize(&graph)
        .await
        .unwrap();

    assert!(provider.request_for("edge-vpc").is_some());
    // No private subnets: instances share the public one.
    assert_eq!(
        property(&provider, "auto-scaling-group", "vpc_zone_identifiers"),
        json!([id_of(&provider, ResourceKind::Subnet, "public-subnet-0")])
    );
    assert_eq!(property(&provider, "launch-template", "user_data"), json!("IyEvYmluL3NoCg=="));
    assert!(outputs.exports.resolve().await.unwrap().get("private-subnet-ids") == Some(&json!([])));
}
