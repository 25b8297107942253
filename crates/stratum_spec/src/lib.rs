//! # stratum_spec
//!
//! Stack configuration for Stratum: the YAML document describing the
//! network, the load balancer in front of it and the scaling group behind it.
//!
//! ## Features
//!
//! - **Models**: `serde` types for the `network`, `load_balancer` (`alb`) and
//!   `scaling` (`asg`) sections, accepting hyphenated field names as aliases
//! - **Reader**: loads the stack file and the user-data script it points to
//! - **Validation**: human-readable errors and warnings before anything is
//!   declared
//!
//! ## Example
//!
//! ```rust,no_run
//! use stratum_spec::{SpecReader, StackValidator};
//!
//! let document = SpecReader::load("stack.yaml").unwrap();
//! let result = StackValidator::validate(&document.spec);
//! if !result.valid {
//!     for error in &result.errors {
//!         eprintln!("Error: {}", error);
//!     }
//! }
//! ```

pub mod cidr;
pub mod error;
pub mod models;
pub mod reader;
pub mod validator;

pub use cidr::Ipv4Cidr;
pub use error::{SpecError, SpecResult};
pub use models::{LoadBalancerSpec, NetworkSpec, ScalingSpec, StackSpec, SubnetSpec, VpcSpec};
pub use reader::{SpecReader, StackDocument};
pub use validator::{StackValidator, ValidationResult};
