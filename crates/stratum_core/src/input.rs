//! Resource inputs: literals and deferred values, possibly nested.

use std::collections::{BTreeMap, BTreeSet};

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::deferred::{Deferred, DeferredError};
use crate::graph::NodeId;

/// An input that could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("input '{input}' could not be resolved: {source}")]
pub struct UnresolvedInput {
    pub input: String,
    #[source]
    pub source: DeferredError,
}

/// One property value of a resource.
#[derive(Debug, Clone)]
pub enum Input {
    Literal(Value),
    Deferred(Deferred<Value>),
    List(Vec<Input>),
    Map(BTreeMap<String, Input>),
}

impl Input {
    /// Build a nested object input.
    pub fn object<K, I>(entries: impl IntoIterator<Item = (K, I)>) -> Self
    where
        K: Into<String>,
        I: Into<Input>,
    {
        Input::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Producer nodes referenced anywhere in this input.
    pub fn sources(&self) -> BTreeSet<NodeId> {
        let mut sources = BTreeSet::new();
        self.collect_sources(&mut sources);
        sources
    }

    fn collect_sources(&self, into: &mut BTreeSet<NodeId>) {
        match self {
            Input::Literal(_) => {}
            Input::Deferred(deferred) => into.extend(deferred.sources()),
            Input::List(items) => items.iter().for_each(|item| item.collect_sources(into)),
            Input::Map(entries) => entries.values().for_each(|item| item.collect_sources(into)),
        }
    }

    pub fn resolve(&self) -> BoxFuture<'_, Result<Value, DeferredError>> {
        async move {
            match self {
                Input::Literal(value) => Ok(value.clone()),
                Input::Deferred(deferred) => deferred.resolve().await,
                Input::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(item.resolve().await?);
                    }
                    Ok(Value::Array(values))
                }
                Input::Map(entries) => {
                    let mut object = serde_json::Map::new();
                    for (key, item) in entries {
                        object.insert(key.clone(), item.resolve().await?);
                    }
                    Ok(Value::Object(object))
                }
            }
        }
        .boxed()
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Input::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Input]> {
        match self {
            Input::List(items) => Some(items),
            _ => None,
        }
    }

    /// Entry of a map input.
    pub fn get(&self, key: &str) -> Option<&Input> {
        match self {
            Input::Map(entries) => entries.get(key),
            _ => None,
        }
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Literal(value)
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Literal(Value::String(value))
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Input::Literal(Value::Bool(value))
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Input {
                fn from(value: $ty) -> Self {
                    Input::Literal(Value::from(value))
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u16, u32, u64, usize);

impl<T: Into<Input>> From<Vec<T>> for Input {
    fn from(items: Vec<T>) -> Self {
        Input::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Deferred<T>> for Input
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    fn from(value: Deferred<T>) -> Self {
        Input::Deferred(value.to_value())
    }
}

impl<T> From<&Deferred<T>> for Input
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    fn from(value: &Deferred<T>) -> Self {
        Input::Deferred(value.to_value())
    }
}

/// Named inputs of one resource.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: BTreeMap<String, Input>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a property only when a value is present.
    pub fn with_opt<V: Into<Input>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Input>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Input> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Input)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sources(&self) -> BTreeSet<NodeId> {
        let mut sources = BTreeSet::new();
        for input in self.entries.values() {
            input.collect_sources(&mut sources);
        }
        sources
    }

    /// Resolve every input, failing on the first one that cannot be.
    pub async fn resolve(&self) -> Result<BTreeMap<String, Value>, UnresolvedInput> {
        let mut resolved = BTreeMap::new();
        for (key, input) in &self.entries {
            let value = input.resolve().await.map_err(|source| UnresolvedInput {
                input: key.clone(),
                source,
            })?;
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::OutputSlot;
    use serde_json::json;
    use stratum_provider::Attributes;

    #[tokio::test]
    async fn test_literals_resolve_immediately() {
        let props = Properties::new()
            .with("cidr_block", "10.0.0.0/16")
            .with("enable_dns_support", true)
            .with("port", 80u16)
            .with_opt("iam_instance_profile", None::<String>);

        assert!(props.sources().is_empty());
        assert_eq!(props.len(), 3);

        let resolved = props.resolve().await.unwrap();
        assert_eq!(resolved["cidr_block"], json!("10.0.0.0/16"));
        assert_eq!(resolved["port"], json!(80));
    }

    #[tokio::test]
    async fn test_nested_deferred_inputs() {
        let slot = OutputSlot::new("internet-gateway");
        let igw = Deferred::from_slot(NodeId::new(7), slot.clone())
            .map(|attrs| attrs["id"].as_str().unwrap_or_default().to_string());

        let routes = Input::from(vec![Input::object([
            ("cidr_block", Input::from("0.0.0.0/0")),
            ("gateway_id", Input::from(&igw)),
        ])]);
        let props = Properties::new().with("routes", routes);

        assert_eq!(props.sources(), BTreeSet::from([NodeId::new(7)]));

        slot.fulfil(Attributes::from([("id".to_string(), json!("igw-1"))]));
        let resolved = props.resolve().await.unwrap();
        assert_eq!(
            resolved["routes"],
            json!([{"cidr_block": "0.0.0.0/0", "gateway_id": "igw-1"}])
        );
    }

    #[tokio::test]
    async fn test_unresolved_input_names_key() {
        let slot = OutputSlot::new("nat-gateway");
        let nat = Deferred::from_slot(NodeId::new(0), slot.clone());
        slot.abandon();

        let err = Properties::new()
            .with("nat_gateway_id", nat.map(|a| a.len()))
            .resolve()
            .await
            .unwrap_err();

        assert_eq!(err.input, "nat_gateway_id");
        assert_eq!(
            err.source,
            DeferredError::Unresolved {
                producer: "nat-gateway".to_string()
            }
        );
    }

    #[test]
    fn test_input_accessors() {
        let input = Input::object([("protocol", "tcp")]);
        assert_eq!(input.get("protocol").and_then(Input::as_literal), Some(&json!("tcp")));
        assert!(input.as_list().is_none());
    }
}
