//! # stratum_provider
//!
//! Provisioning provider seam for Stratum.
//!
//! The orchestrator never talks to a cloud API directly. Every resource
//! creation goes through the [`ProvisioningProvider`] trait, which receives the
//! resource kind, its logical name and a fully resolved property bag, and
//! answers with the identifying attributes of the created object.
//!
//! # Features
//!
//! - **Resource Catalogue**: [`ResourceKind`] enumerates the create operations
//! - **Provider Trait**: async, object-safe, `Send + Sync`
//! - **Mock Provider**: deterministic ids, call capture, failure injection and
//!   latency simulation, used by tests and by the CLI's simulated apply
//!
//! # Example
//!
//! ```rust,no_run
//! use stratum_provider::{CreateRequest, MockProvider, ProvisioningProvider, ResourceKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = MockProvider::new();
//!     let request = CreateRequest::new(ResourceKind::Vpc, "main-vpc")
//!         .property("cidr_block", "10.0.0.0/16");
//!
//!     let attributes = provider.create(&request).await?;
//!     println!("created {}", attributes["id"]);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod kind;
pub mod mock;
pub mod provider;

pub use error::{ProviderError, ProviderResult};
pub use kind::ResourceKind;
pub use mock::{CapturedRequest, MockProvider};
pub use provider::{Attributes, CreateRequest, ProvisioningProvider};
