//! # stratum_core
//!
//! Deferred-value resolution, dependency graph and orchestrator for Stratum.
//!
//! Cloud identifiers only exist after the provider creates an object, yet
//! downstream resources have to be declared against them up front. This crate
//! models that gap:
//!
//! - **Deferred values**: single-assignment handles that `map`, `zip` and
//!   `combine` without blocking
//! - **Resource graph**: nodes with literal or deferred inputs; feeding a
//!   deferred value into an input adds an implicit edge
//! - **Orchestrator**: topological, bounded-concurrency realization with
//!   partial-failure reporting and a persisted run report
//! - **Exports**: stable keys over deferred outputs, resolved at the end
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratum_core::{Orchestrator, Properties, ResourceGraph};
//! use stratum_provider::{MockProvider, ResourceKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = ResourceGraph::new();
//! let vpc = graph.declare(
//!     ResourceKind::Vpc,
//!     "main-vpc",
//!     Properties::new().with("cidr_block", "10.0.0.0/16"),
//! )?;
//! graph.declare(
//!     ResourceKind::InternetGateway,
//!     "internet-gateway",
//!     Properties::new().with("vpc_id", vpc.id()),
//! )?;
//!
//! let report = Orchestrator::new(Arc::new(MockProvider::new()))
//!     .realize(&graph)
//!     .await?;
//! println!("created {:?}", report.completed_names());
//! # Ok(())
//! # }
//! ```

pub mod deferred;
pub mod error;
pub mod executor;
pub mod exports;
pub mod graph;
pub mod input;
pub mod report;

pub use deferred::{Deferred, DeferredError};
pub use error::{CoreError, CoreResult};
pub use executor::{CancelToken, Orchestrator, DEFAULT_CONCURRENCY};
pub use exports::{ExportedOutputs, Exports};
pub use graph::{GraphShape, NodeId, Resource, ResourceGraph, ResourceNode, ShapeEdge, ShapeNode};
pub use input::{Input, Properties, UnresolvedInput};
pub use report::{NodeFailure, NodeRecord, NodeRef, PartialFailure, RunReport, RunState};
