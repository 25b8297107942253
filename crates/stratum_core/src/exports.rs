//! Named outputs of a provisioning run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::deferred::Deferred;
use crate::error::{CoreError, CoreResult};

/// Deferred values published under stable keys.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    entries: BTreeMap<String, Deferred<Value>>,
}

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a deferred value. A later export under the same key wins.
    pub fn export<T>(&mut self, key: impl Into<String>, value: &Deferred<T>)
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        self.entries.insert(key.into(), value.to_value());
    }

    pub fn get(&self, key: &str) -> Option<&Deferred<Value>> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wait for every export. Only meaningful after a completed run;
    /// after a failed run an abandoned producer yields [`CoreError::UnresolvedExport`].
    pub async fn resolve(&self) -> CoreResult<ExportedOutputs> {
        let mut outputs = BTreeMap::new();
        for (key, value) in &self.entries {
            let resolved = value.resolve().await.map_err(|source| CoreError::UnresolvedExport {
                key: key.clone(),
                source,
            })?;
            outputs.insert(key.clone(), resolved);
        }
        Ok(ExportedOutputs(outputs))
    }

    /// The exports that are already available, without waiting.
    pub fn resolved(&self) -> ExportedOutputs {
        ExportedOutputs(
            self.entries
                .iter()
                .filter_map(|(key, value)| match value.try_get() {
                    Some(Ok(v)) => Some((key.clone(), v)),
                    _ => None,
                })
                .collect(),
        )
    }
}

/// Resolved export values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportedOutputs(BTreeMap<String, Value>);

impl ExportedOutputs {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::OutputSlot;
    use crate::graph::NodeId;
    use serde_json::json;
    use stratum_provider::Attributes;

    #[tokio::test]
    async fn test_resolve_ready_exports() {
        let mut exports = Exports::new();
        exports.export("public-subnet-ids", &Deferred::ready(vec!["subnet-a".to_string()]));
        exports.export("vpc-id", &Deferred::ready("vpc-1".to_string()));

        let outputs = exports.resolve().await.unwrap();
        assert_eq!(outputs.get_str("vpc-id"), Some("vpc-1"));
        assert_eq!(outputs.get("public-subnet-ids"), Some(&json!(["subnet-a"])));
        assert_eq!(exports.keys().collect::<Vec<_>>(), vec!["public-subnet-ids", "vpc-id"]);
    }

    #[tokio::test]
    async fn test_abandoned_export_is_reported() {
        let slot = OutputSlot::new("nat-gateway");
        let nat = Deferred::from_slot(NodeId::new(0), slot.clone()).map(|a: Attributes| a.len());

        let mut exports = Exports::new();
        exports.export("nat-gateway-id", &nat);
        exports.export("vpc-id", &Deferred::ready("vpc-1".to_string()));

        assert_eq!(exports.resolved().len(), 1);

        slot.abandon();
        let err = exports.resolve().await.unwrap_err();
        assert!(matches!(err, CoreError::UnresolvedExport { key, .. } if key == "nat-gateway-id"));
    }
}
