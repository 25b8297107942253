//! Provisioning provider trait and request types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderResult;
use crate::kind::ResourceKind;

/// Identifying attributes of a created object (`id`, `arn`, `dns_name`, ...).
pub type Attributes = BTreeMap<String, Value>;

/// A fully resolved create call.
///
/// Every deferred input has been resolved by the time a request is built,
/// so a provider only ever sees plain JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Kind of object to create
    pub kind: ResourceKind,
    /// Logical name, unique within one run
    pub name: String,
    /// Desired properties
    pub properties: BTreeMap<String, Value>,
}

impl CreateRequest {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Set a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Get a string property.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// The seam between the engine and the cloud.
///
/// Implementations must be safe to call concurrently: the orchestrator
/// realizes independent nodes in parallel. Retry and backoff policy belong
/// to the implementation; the engine never retries a failed create.
#[async_trait]
pub trait ProvisioningProvider: Send + Sync {
    /// Create one object and return its identifying attributes.
    async fn create(&self, request: &CreateRequest) -> ProviderResult<Attributes>;
}
