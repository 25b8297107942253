//! Stratum CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Provisioning failure
//! - 130: Cancelled

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, LogFormat};
use stratum_core::CoreError;
use stratum_spec::SpecError;
use stratum_stack::StackError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const PROVISIONING_FAILURE: u8 = 4;
    pub const CANCELLED: u8 = 130;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Plan(args) => commands::plan::execute(args).await,
        Commands::Apply(args) => commands::apply::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "stratum=debug,warn"
    } else {
        "stratum=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let layer = match cli.log_format {
        LogFormat::Text => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_target(false).boxed(),
    };

    // Already initialized when embedded in a test harness.
    let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
}

/// Map an error to an exit code by walking its source chain.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(core) = cause.downcast_ref::<CoreError>() {
            return core_exit_code(core);
        }
        if let Some(spec) = cause.downcast_ref::<SpecError>() {
            return spec_exit_code(spec);
        }
        if let Some(stack) = cause.downcast_ref::<StackError>() {
            return match stack {
                StackError::Core(core) => core_exit_code(core),
                StackError::Spec(spec) => spec_exit_code(spec),
                _ => ExitCodes::VALIDATION_FAILURE,
            };
        }
    }
    ExitCodes::GENERAL_ERROR
}

fn core_exit_code(e: &CoreError) -> u8 {
    match e {
        CoreError::Cancelled { .. } => ExitCodes::CANCELLED,
        CoreError::PartialFailure(_)
        | CoreError::CycleDetected { .. }
        | CoreError::UnresolvedExport { .. } => ExitCodes::PROVISIONING_FAILURE,
        CoreError::DuplicateResource(_) | CoreError::UnknownNode(_) | CoreError::EmptyCombine => {
            ExitCodes::VALIDATION_FAILURE
        }
        CoreError::AlreadyRealized | CoreError::Io(_) | CoreError::Serialization(_) => {
            ExitCodes::GENERAL_ERROR
        }
    }
}

fn spec_exit_code(e: &SpecError) -> u8 {
    match e {
        SpecError::NotFound(_) | SpecError::UserDataNotFound(_) => ExitCodes::INVALID_ARGS,
        SpecError::ValidationFailed(_)
        | SpecError::InvalidFormat { .. }
        | SpecError::InvalidCidr { .. }
        | SpecError::Yaml(_) => ExitCodes::VALIDATION_FAILURE,
        SpecError::Io(_) => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_for_validation_failure() {
        let err = anyhow::Error::from(SpecError::ValidationFailed("bad".to_string()));
        assert_eq!(categorize_error(&err), ExitCodes::VALIDATION_FAILURE);
    }

    #[test]
    fn test_exit_code_through_context() {
        let result: Result<(), SpecError> = Err(SpecError::NotFound(PathBuf::from("stack.yaml")));
        let err = result.context("Failed to load stack").unwrap_err();
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_exit_code_for_cancellation() {
        let err = anyhow::Error::from(CoreError::Cancelled {
            completed: Vec::new(),
            not_started: Vec::new(),
        });
        assert_eq!(categorize_error(&err), ExitCodes::CANCELLED);
    }

    #[test]
    fn test_exit_code_for_stack_errors() {
        let bounds = anyhow::Error::from(StackError::InvalidScalingBounds {
            min: 5,
            max: 3,
            desired: 4,
        });
        assert_eq!(categorize_error(&bounds), ExitCodes::VALIDATION_FAILURE);

        let cycle = anyhow::Error::from(StackError::Core(CoreError::CycleDetected {
            cycle: vec!["a".to_string(), "a".to_string()],
        }));
        assert_eq!(categorize_error(&cycle), ExitCodes::PROVISIONING_FAILURE);
    }

    #[test]
    fn test_exit_code_default() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);
    }
}
