//! Resource nodes and the dependency graph.
//!
//! Builders declare resources into a [`ResourceGraph`]. Each declaration
//! returns a [`Resource`] handle whose outputs are [`Deferred`] values; feeding
//! those into another declaration's [`Properties`] creates an implicit edge.
//! Explicit `depends-on` edges are passed alongside.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use stratum_provider::{Attributes, ResourceKind};
use tracing::debug;
use uuid::Uuid;

use crate::deferred::{Deferred, DeferredError, OutputSlot};
use crate::error::{CoreError, CoreResult};
use crate::input::Properties;
use crate::report::NodeRef;

/// Position of a node in its graph, assigned in declaration order.
///
/// Ids also remember which graph issued them so that a handle from one graph
/// cannot be wired into another. Only the index is serialized; ids read back
/// from a run report, or built with [`NodeId::new`], belong to no graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    graph: Uuid,
    index: usize,
}

impl NodeId {
    pub fn new(index: usize) -> Self {
        Self {
            graph: Uuid::nil(),
            index,
        }
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.index.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        usize::deserialize(deserializer).map(Self::new)
    }
}

/// A declared resource as the orchestrator sees it.
#[derive(Debug)]
pub struct ResourceNode {
    id: NodeId,
    kind: ResourceKind,
    name: String,
    inputs: Properties,
    explicit_deps: BTreeSet<NodeId>,
    slot: Arc<OutputSlot>,
}

impl ResourceNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &Properties {
        &self.inputs
    }

    pub fn explicit_dependencies(&self) -> &BTreeSet<NodeId> {
        &self.explicit_deps
    }

    /// Producers of the deferred values used in this node's inputs.
    pub fn implicit_dependencies(&self) -> BTreeSet<NodeId> {
        self.inputs.sources()
    }

    /// Every node that must be realized before this one.
    pub fn dependencies(&self) -> BTreeSet<NodeId> {
        let mut deps = self.implicit_dependencies();
        deps.extend(self.explicit_deps.iter().copied());
        deps
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
        }
    }

    pub(crate) fn slot(&self) -> Arc<OutputSlot> {
        self.slot.clone()
    }
}

/// Handle returned by a declaration, used to wire outputs downstream.
#[derive(Debug, Clone)]
pub struct Resource {
    id: NodeId,
    kind: ResourceKind,
    name: String,
    outputs: Deferred<Attributes>,
}

impl Resource {
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full attribute map reported by the provider.
    pub fn outputs(&self) -> &Deferred<Attributes> {
        &self.outputs
    }

    /// A single output attribute. Resolves to an error if the provider
    /// did not report it.
    pub fn attr(&self, attribute: &str) -> Deferred<Value> {
        let producer = self.name.clone();
        let attribute = attribute.to_string();
        self.outputs.try_map(move |attributes| {
            attributes
                .get(&attribute)
                .cloned()
                .ok_or_else(|| DeferredError::MissingAttribute {
                    producer: producer.clone(),
                    attribute: attribute.clone(),
                })
        })
    }

    /// A single string attribute.
    pub fn attr_str(&self, attribute: &str) -> Deferred<String> {
        let producer = self.name.clone();
        let name = attribute.to_string();
        self.attr(attribute).try_map(move |value| match value {
            Value::String(s) => Ok(s),
            _ => Err(DeferredError::NotAString {
                producer: producer.clone(),
                attribute: name.clone(),
            }),
        })
    }

    pub fn id(&self) -> Deferred<String> {
        self.attr_str("id")
    }

    pub fn arn(&self) -> Deferred<String> {
        self.attr_str("arn")
    }
}

/// Serializable description of a graph's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphShape {
    pub nodes: Vec<ShapeNode>,
    pub edges: Vec<ShapeEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeNode {
    pub name: String,
    pub kind: ResourceKind,
}

/// `from` must exist before `to` is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeEdge {
    pub from: String,
    pub to: String,
    /// Declared as `depends-on` rather than inferred from inputs
    pub explicit: bool,
}

/// The set of resources of one provisioning run.
#[derive(Debug)]
pub struct ResourceGraph {
    id: Uuid,
    nodes: Vec<ResourceNode>,
    by_name: HashMap<String, NodeId>,
    claimed: AtomicBool,
}

impl Default for ResourceGraph {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            nodes: Vec::new(),
            by_name: HashMap::new(),
            claimed: AtomicBool::new(false),
        }
    }
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource whose only dependencies come from its inputs.
    pub fn declare(
        &mut self,
        kind: ResourceKind,
        name: impl Into<String>,
        inputs: Properties,
    ) -> CoreResult<Resource> {
        self.declare_after(kind, name, inputs, &[])
    }

    /// Declare a resource with additional explicit dependencies.
    pub fn declare_after(
        &mut self,
        kind: ResourceKind,
        name: impl Into<String>,
        inputs: Properties,
        depends_on: &[&Resource],
    ) -> CoreResult<Resource> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(CoreError::DuplicateResource(name));
        }

        for source in inputs.sources() {
            if !self.owns(source) {
                return Err(CoreError::UnknownNode(format!(
                    "{} (input of '{}')",
                    source, name
                )));
            }
        }

        let mut explicit_deps = BTreeSet::new();
        for dependency in depends_on {
            explicit_deps.insert(self.check_known(dependency)?);
        }

        let id = NodeId {
            graph: self.id,
            index: self.nodes.len(),
        };
        let slot = OutputSlot::new(name.clone());
        let outputs = Deferred::from_slot(id, slot.clone());

        debug!(
            "Declared {} '{}' ({} inputs, {} explicit deps)",
            kind,
            name,
            inputs.len(),
            explicit_deps.len()
        );

        self.nodes.push(ResourceNode {
            id,
            kind,
            name: name.clone(),
            inputs,
            explicit_deps,
            slot,
        });
        self.by_name.insert(name.clone(), id);

        Ok(Resource {
            id,
            kind,
            name,
            outputs,
        })
    }

    /// Add an explicit edge after both resources were declared.
    pub fn add_dependency(&mut self, dependent: &Resource, dependency: &Resource) -> CoreResult<()> {
        let dependent = self.check_known(dependent)?;
        let dependency = self.check_known(dependency)?;
        self.nodes[dependent.index()].explicit_deps.insert(dependency);
        Ok(())
    }

    /// Reserve the graph for a run. Only the first caller gets `true`.
    pub(crate) fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::SeqCst)
    }

    /// Whether a run has already been started on this graph.
    pub fn is_realized(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    fn owns(&self, id: NodeId) -> bool {
        id.graph == self.id && id.index < self.nodes.len()
    }

    fn check_known(&self, resource: &Resource) -> CoreResult<NodeId> {
        match self.by_name.get(&resource.name) {
            Some(id) if *id == resource.id => Ok(*id),
            _ => Err(CoreError::UnknownNode(resource.name.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> CoreResult<&ResourceNode> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| CoreError::UnknownNode(id.to_string()))
    }

    pub fn find(&self, name: &str) -> Option<&ResourceNode> {
        self.by_name.get(name).map(|id| &self.nodes[id.index()])
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter()
    }

    pub fn nodes_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |node| node.kind == kind)
    }

    /// All `(producer, consumer)` pairs, sorted.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges: Vec<(NodeId, NodeId)> = self
            .nodes
            .iter()
            .flat_map(|node| {
                node.dependencies()
                    .into_iter()
                    .map(move |dependency| (dependency, node.id))
            })
            .collect();
        edges.sort();
        edges
    }

    /// Nodes that directly depend on `id`.
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.dependencies().contains(&id))
            .map(|node| node.id)
            .collect()
    }

    /// Kahn's algorithm with ties broken by declaration order.
    pub fn topological_order(&self) -> CoreResult<Vec<NodeId>> {
        let mut pending: Vec<usize> = self.nodes.iter().map(|n| n.dependencies().len()).collect();
        let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        for (producer, consumer) in self.edges() {
            dependents[producer.index()].push(consumer);
        }

        let mut ready: BTreeSet<NodeId> = self
            .nodes
            .iter()
            .filter(|node| pending[node.id.index()] == 0)
            .map(|node| node.id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            for dependent in &dependents[id.index()] {
                let count = &mut pending[dependent.index()];
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let stuck: BTreeSet<NodeId> = self
                .nodes
                .iter()
                .filter(|node| pending[node.id.index()] > 0)
                .map(|node| node.id)
                .collect();
            return Err(CoreError::CycleDetected {
                cycle: self.find_cycle(&stuck),
            });
        }

        Ok(order)
    }

    /// Every stuck node still has a stuck dependency, so walking
    /// dependencies from any of them must revisit a node.
    fn find_cycle(&self, stuck: &BTreeSet<NodeId>) -> Vec<String> {
        let Some(start) = stuck.iter().next().copied() else {
            return Vec::new();
        };

        let mut path: Vec<NodeId> = Vec::new();
        let mut position: HashMap<NodeId, usize> = HashMap::new();
        let mut current = start;

        loop {
            if let Some(&at) = position.get(&current) {
                let mut cycle: Vec<String> = path[at..]
                    .iter()
                    .map(|id| self.nodes[id.index()].name.clone())
                    .collect();
                cycle.push(self.nodes[current.index()].name.clone());
                return cycle;
            }
            position.insert(current, path.len());
            path.push(current);

            match self.nodes[current.index()]
                .dependencies()
                .into_iter()
                .find(|dependency| stuck.contains(dependency))
            {
                Some(next) => current = next,
                None => return path.iter().map(|id| self.nodes[id.index()].name.clone()).collect(),
            }
        }
    }

    /// Names, kinds and edges, independent of any realization.
    pub fn shape(&self) -> GraphShape {
        let nodes = self
            .nodes
            .iter()
            .map(|node| ShapeNode {
                name: node.name.clone(),
                kind: node.kind,
            })
            .collect();

        let edges = self
            .edges()
            .into_iter()
            .map(|(producer, consumer)| ShapeEdge {
                from: self.nodes[producer.index()].name.clone(),
                to: self.nodes[consumer.index()].name.clone(),
                explicit: self.nodes[consumer.index()].explicit_deps.contains(&producer),
            })
            .collect();

        GraphShape { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Properties;

    fn declare(graph: &mut ResourceGraph, kind: ResourceKind, name: &str) -> Resource {
        graph.declare(kind, name, Properties::new()).unwrap()
    }

    #[test]
    fn test_implicit_edge_from_input() {
        let mut graph = ResourceGraph::new();
        let vpc = declare(&mut graph, ResourceKind::Vpc, "main-vpc");
        let subnet = graph
            .declare(
                ResourceKind::Subnet,
                "public-subnet-0",
                Properties::new().with("vpc_id", vpc.id()),
            )
            .unwrap();

        let node = graph.find("public-subnet-0").unwrap();
        assert_eq!(node.implicit_dependencies(), BTreeSet::from([vpc.node_id()]));
        assert!(node.explicit_dependencies().is_empty());
        assert_eq!(graph.edges(), vec![(vpc.node_id(), subnet.node_id())]);
    }

    #[test]
    fn test_explicit_edge() {
        let mut graph = ResourceGraph::new();
        let sg = declare(&mut graph, ResourceKind::SecurityGroup, "alb-security-group");
        graph
            .declare_after(ResourceKind::LoadBalancer, "app-load-balancer", Properties::new(), &[&sg])
            .unwrap();

        let shape = graph.shape();
        assert_eq!(shape.edges.len(), 1);
        assert!(shape.edges[0].explicit);
        assert_eq!(shape.edges[0].from, "alb-security-group");
        assert_eq!(shape.edges[0].to, "app-load-balancer");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut graph = ResourceGraph::new();
        declare(&mut graph, ResourceKind::Vpc, "main-vpc");
        let result = graph.declare(ResourceKind::Vpc, "main-vpc", Properties::new());
        assert!(matches!(result, Err(CoreError::DuplicateResource(name)) if name == "main-vpc"));
    }

    #[test]
    fn test_foreign_resource_rejected() {
        let mut other = ResourceGraph::new();
        declare(&mut other, ResourceKind::Vpc, "a");
        let foreign = declare(&mut other, ResourceKind::Vpc, "b");

        let mut graph = ResourceGraph::new();
        let result = graph.declare_after(ResourceKind::Subnet, "s", Properties::new(), &[&foreign]);
        assert!(matches!(result, Err(CoreError::UnknownNode(_))));

        let result = graph.declare(
            ResourceKind::Subnet,
            "t",
            Properties::new().with("vpc_id", foreign.id()),
        );
        assert!(matches!(result, Err(CoreError::UnknownNode(_))));
    }

    #[test]
    fn test_input_from_other_graph_rejected_even_when_index_exists() {
        let mut other = ResourceGraph::new();
        let foreign = declare(&mut other, ResourceKind::Vpc, "vpc");

        let mut graph = ResourceGraph::new();
        declare(&mut graph, ResourceKind::Vpc, "local-vpc");
        declare(&mut graph, ResourceKind::ElasticIp, "eip");
        assert!(foreign.node_id().index() < graph.len());

        let result = graph.declare(
            ResourceKind::InternetGateway,
            "igw",
            Properties::new().with("vpc_id", foreign.id()),
        );
        assert!(matches!(result, Err(CoreError::UnknownNode(_))));
        assert_eq!(graph.len(), 2);

        let result = graph.declare_after(ResourceKind::Subnet, "vpc", Properties::new(), &[&foreign]);
        assert!(matches!(result, Err(CoreError::UnknownNode(_))));
    }

    #[test]
    fn test_node_id_serializes_as_index() {
        let mut graph = ResourceGraph::new();
        declare(&mut graph, ResourceKind::Vpc, "a");
        let b = declare(&mut graph, ResourceKind::Vpc, "b");

        let json = serde_json::to_value(b.node_id()).unwrap();
        assert_eq!(json, serde_json::json!(1));
        let back: NodeId = serde_json::from_value(json).unwrap();
        assert_eq!(back, NodeId::new(1));
        assert_eq!(back.to_string(), "#1");
    }

    #[test]
    fn test_topological_order_breaks_ties_by_declaration() {
        let mut graph = ResourceGraph::new();
        let vpc = declare(&mut graph, ResourceKind::Vpc, "vpc");
        let late = graph
            .declare(ResourceKind::Subnet, "late", Properties::new().with("vpc_id", vpc.id()))
            .unwrap();
        let free = declare(&mut graph, ResourceKind::ElasticIp, "eip");

        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec![vpc.node_id(), late.node_id(), free.node_id()]);
    }

    #[test]
    fn test_cycle_detected_and_named() {
        let mut graph = ResourceGraph::new();
        let a = declare(&mut graph, ResourceKind::SecurityGroup, "a");
        let b = graph
            .declare(ResourceKind::SecurityGroup, "b", Properties::new().with("peer", a.id()))
            .unwrap();
        declare(&mut graph, ResourceKind::Vpc, "unrelated");
        graph.add_dependency(&a, &b).unwrap();

        match graph.topological_order() {
            Err(CoreError::CycleDetected { cycle }) => {
                assert_eq!(cycle.len(), 3);
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut graph = ResourceGraph::new();
        let a = declare(&mut graph, ResourceKind::Vpc, "a");
        graph.add_dependency(&a, &a).unwrap();

        let err = graph.topological_order().unwrap_err();
        assert_eq!(err.to_string(), "Dependency cycle detected: a -> a");
    }

    #[test]
    fn test_dependents() {
        let mut graph = ResourceGraph::new();
        let vpc = declare(&mut graph, ResourceKind::Vpc, "vpc");
        let igw = graph
            .declare(ResourceKind::InternetGateway, "igw", Properties::new().with("vpc_id", vpc.id()))
            .unwrap();
        let sg = graph
            .declare(ResourceKind::SecurityGroup, "sg", Properties::new().with("vpc_id", vpc.id()))
            .unwrap();

        assert_eq!(graph.dependents(vpc.node_id()), vec![igw.node_id(), sg.node_id()]);
        assert!(graph.dependents(igw.node_id()).is_empty());
        assert_eq!(graph.nodes_of_kind(ResourceKind::SecurityGroup).count(), 1);
    }
}
