//! Mock provisioning provider.
//!
//! Provides a deterministic in-process implementation of the
//! [`ProvisioningProvider`] trait for unit tests and simulated runs, without
//! touching a real cloud account.
//!
//! Identifiers are derived from the resource kind and logical name, so the
//! same stack always yields the same ids regardless of scheduling order, and
//! re-creating an existing object with identical properties returns the
//! original attributes instead of a duplicate.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::kind::ResourceKind;
use crate::provider::{Attributes, CreateRequest, ProvisioningProvider};

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// 1-based position of the call
    pub sequence: usize,
    pub request: CreateRequest,
    /// Whether the call succeeded
    pub succeeded: bool,
    /// Whether an existing object was returned instead of a new one
    pub reused: bool,
}

/// Mock provider for testing and simulated runs.
#[derive(Clone)]
pub struct MockProvider {
    region: Arc<RwLock<String>>,
    account_id: Arc<RwLock<String>>,
    /// Whether the provider should accept calls.
    available: Arc<RwLock<bool>>,
    /// Objects created so far, keyed by kind and logical name.
    created: Arc<RwLock<HashMap<(ResourceKind, String), (BTreeMap<String, Value>, Attributes)>>>,
    /// Captured calls for verification.
    captured: Arc<RwLock<Vec<CapturedRequest>>>,
    /// Logical names whose creation should fail, with the message to report.
    failures: Arc<RwLock<HashMap<String, String>>>,
    /// Fail the n-th call (1-based) with the given message.
    fail_call: Arc<RwLock<Option<(usize, String)>>>,
    latency: Arc<RwLock<Duration>>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider.
    pub fn new() -> Self {
        Self {
            region: Arc::new(RwLock::new("us-east-1".to_string())),
            account_id: Arc::new(RwLock::new("123456789012".to_string())),
            available: Arc::new(RwLock::new(true)),
            created: Arc::new(RwLock::new(HashMap::new())),
            captured: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            fail_call: Arc::new(RwLock::new(None)),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the region used in generated ARNs and DNS names.
    pub fn with_region(self, region: impl Into<String>) -> Self {
        *self.region.write() = region.into();
        self
    }

    /// Set the account id used in generated ARNs.
    pub fn with_account_id(self, account_id: impl Into<String>) -> Self {
        *self.account_id.write() = account_id.into();
        self
    }

    /// Set whether the provider accepts calls.
    pub fn set_available(self, available: bool) -> Self {
        *self.available.write() = available;
        self
    }

    /// Delay every create call by the given duration.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.write() = latency;
        self
    }

    /// Fail creation of the named resource.
    pub fn fail_on(self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.write().insert(name.into(), message.into());
        self
    }

    /// Fail the n-th create call (1-based), whatever resource it targets.
    pub fn fail_on_call(self, n: usize, message: impl Into<String>) -> Self {
        *self.fail_call.write() = Some((n, message.into()));
        self
    }

    /// Get all captured calls, in call order.
    pub fn get_calls(&self) -> Vec<CapturedRequest> {
        self.captured.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured.read().len()
    }

    /// Get successful calls for a specific kind.
    pub fn requests_of(&self, kind: ResourceKind) -> Vec<CreateRequest> {
        self.captured
            .read()
            .iter()
            .filter(|c| c.succeeded && c.request.kind == kind)
            .map(|c| c.request.clone())
            .collect()
    }

    /// Get the successful request for a logical name.
    pub fn request_for(&self, name: &str) -> Option<CreateRequest> {
        self.captured
            .read()
            .iter()
            .find(|c| c.succeeded && c.request.name == name)
            .map(|c| c.request.clone())
    }

    /// Logical names of every object that exists in the provider.
    pub fn created_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.created.read().keys().map(|(_, n)| n.clone()).collect();
        names.sort();
        names
    }

    /// Attributes of an existing object.
    pub fn attributes_of(&self, kind: ResourceKind, name: &str) -> Option<Attributes> {
        self.created
            .read()
            .get(&(kind, name.to_string()))
            .map(|(_, attributes)| attributes.clone())
    }

    /// Highest number of create calls that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Clear captured calls, keeping created objects.
    pub fn clear_calls(&self) {
        self.captured.write().clear();
    }

    fn record(&self, sequence: usize, request: &CreateRequest, succeeded: bool, reused: bool) {
        self.captured.write().push(CapturedRequest {
            sequence,
            request: request.clone(),
            succeeded,
            reused,
        });
    }

    fn check_failure(&self, sequence: usize, request: &CreateRequest) -> ProviderResult<()> {
        if !*self.available.read() {
            return Err(ProviderError::Unavailable("mock provider disabled".to_string()));
        }

        if let Some(message) = self.failures.read().get(&request.name) {
            return Err(ProviderError::create_failed(
                request.kind.operation(),
                &request.name,
                message.clone(),
            ));
        }

        if let Some((n, message)) = self.fail_call.read().as_ref() {
            if *n == sequence {
                return Err(ProviderError::create_failed(
                    request.kind.operation(),
                    &request.name,
                    message.clone(),
                ));
            }
        }

        Ok(())
    }

    fn materialize(&self, request: &CreateRequest) -> ProviderResult<(Attributes, bool)> {
        let key = (request.kind, request.name.clone());
        let mut created = self.created.write();

        if let Some((properties, attributes)) = created.get(&key) {
            if properties != &request.properties {
                return Err(ProviderError::InvalidRequest {
                    name: request.name.clone(),
                    message: "object exists with different properties".to_string(),
                });
            }
            return Ok((attributes.clone(), true));
        }

        let attributes = self.attributes_for(request);
        created.insert(key, (request.properties.clone(), attributes.clone()));
        Ok((attributes, false))
    }

    fn attributes_for(&self, request: &CreateRequest) -> Attributes {
        let suffix = stable_suffix(request.kind, &request.name);
        let region = self.region.read().clone();
        let account = self.account_id.read().clone();
        let mut attributes = Attributes::new();

        match request.kind {
            ResourceKind::LoadBalancer => {
                let arn = format!(
                    "arn:aws:elasticloadbalancing:{}:{}:loadbalancer/app/{}/{}",
                    region, account, request.name, suffix
                );
                attributes.insert("id".to_string(), Value::String(arn.clone()));
                attributes.insert("arn".to_string(), Value::String(arn));
                attributes.insert(
                    "dns_name".to_string(),
                    Value::String(format!(
                        "{}-{}.{}.elb.amazonaws.com",
                        request.name,
                        &suffix[..8],
                        region
                    )),
                );
            }
            ResourceKind::TargetGroup | ResourceKind::Listener => {
                let arn = format!(
                    "arn:aws:elasticloadbalancing:{}:{}:{}/{}/{}",
                    region,
                    account,
                    request.kind.id_prefix(),
                    request.name,
                    suffix
                );
                attributes.insert("id".to_string(), Value::String(arn.clone()));
                attributes.insert("arn".to_string(), Value::String(arn));
            }
            ResourceKind::AutoScalingGroup => {
                let group_name = request.get_str("name").unwrap_or(&request.name).to_string();
                attributes.insert(
                    "arn".to_string(),
                    Value::String(format!(
                        "arn:aws:autoscaling:{}:{}:autoScalingGroup:{}:autoScalingGroupName/{}",
                        region, account, suffix, group_name
                    )),
                );
                attributes.insert("id".to_string(), Value::String(group_name.clone()));
                attributes.insert("name".to_string(), Value::String(group_name));
            }
            kind => {
                attributes.insert(
                    "id".to_string(),
                    Value::String(format!("{}-{}", kind.id_prefix(), suffix)),
                );
            }
        }

        if request.kind == ResourceKind::ElasticIp {
            attributes.insert(
                "public_ip".to_string(),
                Value::String(format!("203.0.113.{}", u8::from_str_radix(&suffix[..2], 16).unwrap_or(1))),
            );
        }

        attributes
    }
}

/// FNV-1a over kind and name, rendered as 17 hex digits like EC2 ids.
fn stable_suffix(kind: ResourceKind, name: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in kind.as_str().bytes().chain([b'/']).chain(name.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{:017x}", hash)
}

#[async_trait]
impl ProvisioningProvider for MockProvider {
    async fn create(&self, request: &CreateRequest) -> ProviderResult<Attributes> {
        let sequence = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let outcome = self
            .check_failure(sequence, request)
            .and_then(|()| self.materialize(request));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok((attributes, reused)) => {
                let id = attributes.get("id").and_then(Value::as_str).unwrap_or("?");
                debug!("{} {} -> {}", request.kind.operation(), request.name, id);
                self.record(sequence, request, true, reused);
                Ok(attributes)
            }
            Err(e) => {
                self.record(sequence, request, false, false);
                Err(e)
            }
        }
    }
}
