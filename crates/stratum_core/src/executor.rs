//! Orchestrator: concurrent, dependency-ordered realization of a graph.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{FuturesUnordered, StreamExt};
use stratum_provider::{Attributes, CreateRequest, ProvisioningProvider};
use tracing::{debug, error, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::graph::{NodeId, ResourceGraph, ResourceNode};
use crate::report::{NodeFailure, NodeRecord, NodeRef, PartialFailure, RunReport, RunState};

/// Default number of provider calls in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Cooperative cancellation flag shared with the orchestrator.
///
/// Cancelling never interrupts calls already in flight; it only stops new
/// nodes from being scheduled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeStatus {
    Waiting,
    Running,
    Done,
    Failed,
}

struct NodeOutcome {
    id: NodeId,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    result: Result<Attributes, NodeFailure>,
}

/// Realizes a [`ResourceGraph`] against a provider.
pub struct Orchestrator {
    provider: Arc<dyn ProvisioningProvider>,
    concurrency: usize,
    cancel: CancelToken,
    state_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ProvisioningProvider>) -> Self {
        Self {
            provider,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancelToken::new(),
            state_dir: None,
        }
    }

    /// Limit provider calls in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Persist the run report under `dir/runs/` after every created resource.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Create every node of the graph exactly once.
    ///
    /// A graph is single-use: its output slots are filled by this call and
    /// never reset. Realizing it again fails with
    /// [`CoreError::AlreadyRealized`] before any provider call.
    ///
    /// Fails with [`CoreError::CycleDetected`] before any provider call when
    /// the graph is not a DAG. When a node fails, nothing new is scheduled,
    /// in-flight nodes are awaited and the result is a
    /// [`CoreError::PartialFailure`].
    pub async fn realize(&self, graph: &ResourceGraph) -> CoreResult<RunReport> {
        let order = graph.topological_order()?;
        if !graph.claim() {
            return Err(CoreError::AlreadyRealized);
        }
        let total = graph.len();

        let mut rank = vec![0usize; total];
        for (position, id) in order.iter().enumerate() {
            rank[id.index()] = position;
        }

        let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); total];
        for (producer, consumer) in graph.edges() {
            dependents[producer.index()].push(consumer);
        }
        let mut waiting_on: Vec<usize> = graph.nodes().map(|node| node.dependencies().len()).collect();
        let mut status = vec![NodeStatus::Waiting; total];

        let mut ready: BTreeSet<(usize, NodeId)> = graph
            .nodes()
            .filter(|node| waiting_on[node.id().index()] == 0)
            .map(|node| (rank[node.id().index()], node.id()))
            .collect();

        let mut report = RunReport::new(total);
        report.state = RunState::Running;
        report.started_at = Some(Utc::now());

        info!(
            "Starting run {}: {} resources, concurrency {}",
            report.run_id, total, self.concurrency
        );

        let mut in_flight = FuturesUnordered::new();
        let mut failures: Vec<(NodeId, NodeFailure)> = Vec::new();
        let mut halted = false;
        let mut cancelled = false;

        loop {
            if !halted && self.cancel.is_cancelled() {
                info!("Cancellation requested, waiting for {} in-flight resources", in_flight.len());
                halted = true;
                cancelled = true;
            }

            while !halted && in_flight.len() < self.concurrency {
                let Some((_, id)) = ready.pop_first() else {
                    break;
                };
                let node = graph.node(id)?;
                debug!("Scheduling {} '{}'", node.kind(), node.name());
                status[id.index()] = NodeStatus::Running;
                in_flight.push(self.spawn_node(node));
            }

            let Some(outcome) = in_flight.next().await else {
                break;
            };
            let node = graph.node(outcome.id)?;

            match outcome.result {
                Ok(attributes) => {
                    info!("Created {} '{}'", node.kind(), node.name());
                    status[outcome.id.index()] = NodeStatus::Done;
                    report.completed.push(NodeRecord {
                        node: node.node_ref(),
                        attributes,
                        started_at: outcome.started_at,
                        finished_at: outcome.finished_at,
                    });

                    for dependent in &dependents[outcome.id.index()] {
                        let count = &mut waiting_on[dependent.index()];
                        *count -= 1;
                        if *count == 0 {
                            ready.insert((rank[dependent.index()], *dependent));
                        }
                    }

                    self.persist(&report);
                }
                Err(failure) => {
                    error!("Failed to create {} '{}': {}", node.kind(), node.name(), failure);
                    status[outcome.id.index()] = NodeStatus::Failed;
                    failures.push((outcome.id, failure));
                    halted = true;
                }
            }
        }

        for node in graph.nodes() {
            if status[node.id().index()] != NodeStatus::Done {
                node.slot().abandon();
            }
        }

        report.completed_at = Some(Utc::now());
        let completed: Vec<NodeRef> = report.completed.iter().map(|r| r.node.clone()).collect();

        let blocked = Self::blocked_by(&failures, &dependents);
        let mut failures = failures.into_iter();
        if let Some((failed_id, cause)) = failures.next() {
            let mut unresolved = Vec::new();
            let mut not_started = Vec::new();
            for id in &order {
                if status[id.index()] != NodeStatus::Waiting {
                    continue;
                }
                let node = graph.node(*id)?.node_ref();
                if blocked.contains(id) {
                    unresolved.push(node);
                } else {
                    not_started.push(node);
                }
            }

            let additional_failures = failures
                .map(|(id, failure)| graph.node(id).map(|node| (node.node_ref(), failure)))
                .collect::<CoreResult<Vec<_>>>()?;

            let failed = graph.node(failed_id)?.node_ref();
            report.state = RunState::Failed;
            report.error = Some(format!("{}: {}", failed, cause));
            if let Some(dir) = &self.state_dir {
                report.save(dir)?;
            }

            let failure = PartialFailure {
                completed,
                failed,
                cause,
                additional_failures,
                unresolved,
                not_started,
                report,
            };
            warn!("{}", failure);
            return Err(CoreError::PartialFailure(Box::new(failure)));
        }

        let never_started: Vec<NodeRef> = order
            .iter()
            .filter(|id| status[id.index()] == NodeStatus::Waiting)
            .map(|id| graph.node(*id).map(ResourceNode::node_ref))
            .collect::<CoreResult<_>>()?;

        if cancelled && !never_started.is_empty() {
            report.state = RunState::Cancelled;
            report.error = Some("cancelled".to_string());
            if let Some(dir) = &self.state_dir {
                report.save(dir)?;
            }
            warn!(
                "Run {} cancelled: {} created, {} not started",
                report.run_id,
                completed.len(),
                never_started.len()
            );
            return Err(CoreError::Cancelled {
                completed,
                not_started: never_started,
            });
        }

        report.state = RunState::Completed;
        if let Some(dir) = &self.state_dir {
            report.save(dir)?;
        }
        info!("Run {} completed: {} resources created", report.run_id, total);
        Ok(report)
    }

    /// Transitive dependents of every failed node.
    fn blocked_by(failures: &[(NodeId, NodeFailure)], dependents: &[Vec<NodeId>]) -> BTreeSet<NodeId> {
        let mut blocked = BTreeSet::new();
        let mut stack: Vec<NodeId> = failures.iter().map(|(id, _)| *id).collect();
        while let Some(id) = stack.pop() {
            for dependent in &dependents[id.index()] {
                if blocked.insert(*dependent) {
                    stack.push(*dependent);
                }
            }
        }
        blocked
    }

    fn persist(&self, report: &RunReport) {
        if let Some(dir) = &self.state_dir {
            if let Err(e) = report.save(dir) {
                warn!("Could not persist run report: {}", e);
            }
        }
    }

    /// Resolve inputs, call the provider and fill the node's output slot.
    fn spawn_node(&self, node: &ResourceNode) -> impl Future<Output = NodeOutcome> + Send + 'static {
        let id = node.id();
        let kind = node.kind();
        let name = node.name().to_string();
        let inputs = node.inputs().clone();
        let slot = node.slot();
        let provider = self.provider.clone();
        let started_at = Utc::now();

        let handle = tokio::spawn(async move {
            let properties = inputs.resolve().await?;
            let request = CreateRequest {
                kind,
                name,
                properties,
            };
            let attributes = provider.create(&request).await?;
            slot.fulfil(attributes.clone());
            Ok::<_, NodeFailure>(attributes)
        });

        async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(NodeFailure::Panicked(e.to_string())),
            };
            NodeOutcome {
                id,
                started_at,
                finished_at: Utc::now(),
                result,
            }
        }
    }
}
