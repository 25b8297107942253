//! Deferred values.
//!
//! A [`Deferred<T>`] is a handle to a value that only exists once the
//! resource producing it has been created. Builders wire deferred values into
//! the inputs of other resources long before anything talks to a provider;
//! the orchestrator later fills each producer's output slot exactly once, and
//! every handle derived from it resolves from that single assignment.
//!
//! # Construction vs. resolution
//!
//! [`Deferred::map`], [`Deferred::zip`] and [`Deferred::combine`] are pure:
//! they never block and never touch a provider. They only compose resolvers
//! and carry along the set of producer nodes the result depends on, which is
//! how the graph discovers implicit edges.
//!
//! Resolution is cooperative: awaiting [`Deferred::resolve`] parks the task
//! on the producer's slot until it is fulfilled or abandoned.
//!
//! ```rust,ignore
//! let vpc = graph.declare(ResourceKind::Vpc, "main-vpc", props)?;
//! let cidr_tag = vpc.id().map(|id| format!("{id}-tag"));
//! assert_eq!(cidr_tag.sources().collect::<Vec<_>>(), vec![vpc.node_id()]);
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use stratum_provider::Attributes;
use thiserror::Error;
use tokio::sync::watch;

use crate::error::{CoreError, CoreResult};
use crate::graph::NodeId;

/// Why a deferred value could not produce a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeferredError {
    #[error("output of '{producer}' was never resolved")]
    Unresolved { producer: String },

    #[error("'{producer}' has no attribute '{attribute}'")]
    MissingAttribute { producer: String, attribute: String },

    #[error("attribute '{attribute}' of '{producer}' is not a string")]
    NotAString { producer: String, attribute: String },

    #[error("failed to encode value: {0}")]
    Encode(String),
}

#[derive(Debug, Clone)]
enum SlotState {
    Pending,
    Resolved(Arc<Attributes>),
    Abandoned,
}

/// Single-assignment output cell of one resource node.
pub(crate) struct OutputSlot {
    producer: String,
    state: watch::Sender<SlotState>,
}

impl OutputSlot {
    pub(crate) fn new(producer: impl Into<String>) -> Arc<Self> {
        let (state, _) = watch::channel(SlotState::Pending);
        Arc::new(Self {
            producer: producer.into(),
            state,
        })
    }

    /// Store the provider's response. Returns false if the slot was already settled.
    pub(crate) fn fulfil(&self, attributes: Attributes) -> bool {
        let attributes = Arc::new(attributes);
        self.state.send_if_modified(move |state| match state {
            SlotState::Pending => {
                *state = SlotState::Resolved(attributes);
                true
            }
            _ => false,
        })
    }

    /// Mark the slot as never going to resolve, waking every waiter.
    pub(crate) fn abandon(&self) -> bool {
        self.state.send_if_modified(|state| match state {
            SlotState::Pending => {
                *state = SlotState::Abandoned;
                true
            }
            _ => false,
        })
    }

    async fn wait(self: Arc<Self>) -> Result<Attributes, DeferredError> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| !matches!(state, SlotState::Pending))
            .await
            .is_ok();
        let state = rx.borrow().clone();

        match state {
            SlotState::Resolved(attributes) if settled => Ok(attributes.as_ref().clone()),
            _ => Err(DeferredError::Unresolved {
                producer: self.producer.clone(),
            }),
        }
    }
}

impl fmt::Debug for OutputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSlot")
            .field("producer", &self.producer)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

type Resolver<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, DeferredError>> + Send + Sync>;

/// A value that becomes available once its producing resources are realized.
pub struct Deferred<T> {
    sources: Arc<BTreeSet<NodeId>>,
    resolver: Resolver<T>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            sources: self.sources.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("sources", &self.sources)
            .finish()
    }
}

impl Deferred<Attributes> {
    /// Handle on the full attribute map of a node's output slot.
    pub(crate) fn from_slot(node: NodeId, slot: Arc<OutputSlot>) -> Self {
        Self {
            sources: Arc::new(BTreeSet::from([node])),
            resolver: Arc::new(move || slot.clone().wait().boxed()),
        }
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An already-resolved value with no producer.
    pub fn ready(value: T) -> Self {
        Self {
            sources: Arc::new(BTreeSet::new()),
            resolver: Arc::new(move || future::ready(Ok(value.clone())).boxed()),
        }
    }

    /// Nodes whose realization this value waits on.
    pub fn sources(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.sources.iter().copied()
    }

    /// Wait until the value is available.
    pub fn resolve(&self) -> BoxFuture<'static, Result<T, DeferredError>> {
        (self.resolver)()
    }

    /// Peek without waiting. `None` while any producer is still pending.
    pub fn try_get(&self) -> Option<Result<T, DeferredError>> {
        self.resolve().now_or_never()
    }

    /// Transform the value once it resolves.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Transform the value with a fallible function.
    pub fn try_map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Result<U, DeferredError> + Send + Sync + 'static,
    {
        let upstream = self.resolver.clone();
        let f = Arc::new(f);
        Deferred {
            sources: self.sources.clone(),
            resolver: Arc::new(move || {
                let pending = upstream();
                let f = f.clone();
                async move { pending.await.and_then(|value| (*f)(value)) }.boxed()
            }),
        }
    }

    /// Pair this value with another one.
    pub fn zip<U>(&self, other: &Deferred<U>) -> Deferred<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.resolver.clone();
        let right = other.resolver.clone();
        Deferred {
            sources: Arc::new(self.sources.union(&other.sources).copied().collect()),
            resolver: Arc::new(move || future::try_join(left(), right()).boxed()),
        }
    }

    /// Gather several values into one list, preserving order.
    ///
    /// Fails with [`CoreError::EmptyCombine`] when given no values.
    pub fn combine(items: impl IntoIterator<Item = Deferred<T>>) -> CoreResult<Deferred<Vec<T>>> {
        let items: Vec<Deferred<T>> = items.into_iter().collect();
        if items.is_empty() {
            return Err(CoreError::EmptyCombine);
        }

        let sources: BTreeSet<NodeId> = items
            .iter()
            .flat_map(|item| item.sources.iter().copied())
            .collect();
        let resolvers: Arc<[Resolver<T>]> = items.into_iter().map(|item| item.resolver).collect();

        Ok(Deferred {
            sources: Arc::new(sources),
            resolver: Arc::new(move || {
                future::try_join_all(resolvers.iter().map(|resolve| resolve())).boxed()
            }),
        })
    }
}

impl<T> Deferred<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    /// Erase the type into a JSON value for use as a resource input.
    pub fn to_value(&self) -> Deferred<Value> {
        self.try_map(|value| {
            serde_json::to_value(value).map_err(|e| DeferredError::Encode(e.to_string()))
        })
    }
}
