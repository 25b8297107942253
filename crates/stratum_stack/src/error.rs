//! Error types for stack construction.

use thiserror::Error;

/// Result type alias for stack operations.
pub type StackResult<T> = Result<T, StackError>;

/// Errors that can occur while declaring a stack.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Invalid scaling bounds: expected min <= desired <= max, got min={min}, desired={desired}, max={max}")]
    InvalidScalingBounds { min: u32, max: u32, desired: u32 },

    #[error("Load balancer needs at least one subnet")]
    EmptySubnets,

    #[error("Private subnets need a public subnet to host the NAT gateway")]
    MissingPublicSubnet,

    #[error("Scaling group needs subnets or availability zones for placement")]
    EmptyPlacement,

    #[error("Spec error: {0}")]
    Spec(#[from] stratum_spec::SpecError),

    #[error(transparent)]
    Core(#[from] stratum_core::CoreError),
}
