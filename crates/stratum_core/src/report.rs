//! Run reports and partial-failure results.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratum_provider::{Attributes, ProviderError, ResourceKind};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::graph::NodeId;
use crate::input::UnresolvedInput;

/// State of a provisioning run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run has not started
    Pending,
    /// Resources are being created
    Running,
    /// Every resource was created
    Completed,
    /// A resource failed and scheduling stopped
    Failed,
    /// Scheduling stopped on request
    Cancelled,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Identifies a node in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub name: String,
    pub kind: ResourceKind,
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// A resource the provider confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node: NodeRef,
    pub attributes: Attributes,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Persistent record of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    /// Number of nodes in the submitted graph
    pub total_nodes: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Created resources, in completion order
    pub completed: Vec<NodeRecord>,
    /// Error message if the run did not complete
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(total_nodes: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Pending,
            total_nodes,
            started_at: None,
            completed_at: None,
            completed: Vec::new(),
            error: None,
        }
    }

    /// Where this run is stored under a state directory.
    pub fn log_path(&self, state_dir: &Path) -> PathBuf {
        state_dir.join("runs").join(format!("{}.json", self.run_id))
    }

    /// Save the report to disk.
    pub fn save(&self, state_dir: &Path) -> CoreResult<PathBuf> {
        let path = self.log_path(state_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        fs::write(&path, json)?;
        debug!("Saved run report to {:?}", path);
        Ok(path)
    }

    /// Load a report from disk.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn attributes_of(&self, name: &str) -> Option<&Attributes> {
        self.completed
            .iter()
            .find(|record| record.node.name == name)
            .map(|record| &record.attributes)
    }

    pub fn completed_names(&self) -> Vec<&str> {
        self.completed.iter().map(|record| record.node.name.as_str()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Why a single node was not created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeFailure {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    UnresolvedDependency(#[from] UnresolvedInput),

    #[error("task aborted: {0}")]
    Panicked(String),
}

/// Outcome of a run that stopped at a failing node.
#[derive(Debug, Clone)]
pub struct PartialFailure {
    /// Created before scheduling stopped, in completion order
    pub completed: Vec<NodeRef>,
    /// First node that failed
    pub failed: NodeRef,
    /// Its error, verbatim
    pub cause: NodeFailure,
    /// Nodes that were already in flight and failed as well
    pub additional_failures: Vec<(NodeRef, NodeFailure)>,
    /// Never started because a dependency failed
    pub unresolved: Vec<NodeRef>,
    /// Never started because scheduling stopped
    pub not_started: Vec<NodeRef>,
    pub report: RunReport,
}

impl PartialFailure {
    pub fn completed_names(&self) -> Vec<&str> {
        self.completed.iter().map(|node| node.name.as_str()).collect()
    }

    pub fn not_started_names(&self) -> Vec<&str> {
        self.not_started.iter().map(|node| node.name.as_str()).collect()
    }

    pub fn unresolved_names(&self) -> Vec<&str> {
        self.unresolved.iter().map(|node| node.name.as_str()).collect()
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Provisioning failed at {}: {} ({} created, {} blocked by the failure, {} not started)",
            self.failed,
            self.cause,
            self.completed.len(),
            self.unresolved.len(),
            self.not_started.len()
        )
    }
}
